//! The `up` subcommand: reconcile, materialise, launch, verify.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tracing::info;

use burrow_cloudflare::{CloudflareClient, CloudflareConfig};
use burrow_core::paths::RunPaths;
use burrow_core::{DesiredService, plan};
use burrow_setup::supervise::LOG_TAIL_LINES;
use burrow_setup::{RouteStatus, TunnelReport, VerifyOptions, provision};

use crate::locate;
use crate::manifest;

/// Tunnel name used when neither the flag nor the manifest names one.
const DEFAULT_TUNNEL_NAME: &str = "burrow-tunnel";

/// Arguments for the `up` subcommand.
#[derive(Debug, Args)]
pub struct UpArgs {
    /// Cloudflare account email
    #[arg(long, env = "CLOUDFLARE_API_EMAIL")]
    pub api_email: String,

    /// Cloudflare global API key
    #[arg(long, env = "CLOUDFLARE_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Cloudflare account id the tunnel lives under
    #[arg(long, env = "CLOUDFLARE_ACCOUNT_ID")]
    pub account_id: String,

    /// Explicit DNS zone id (skips zone resolution)
    #[arg(long, env = "CLOUDFLARE_ZONE_ID")]
    pub zone_id: Option<String>,

    /// Explicit DNS zone name, matched against the account's zones
    #[arg(long, env = "CLOUDFLARE_ZONE_NAME")]
    pub zone_name: Option<String>,

    /// Tunnel name (falls back to the manifest's, then a default)
    #[arg(long)]
    pub tunnel: Option<String>,

    /// Service to expose, as name:hostname:port[:protocol] (repeatable)
    #[arg(long = "service", value_name = "SPEC", value_parser = parse_service_spec)]
    pub services: Vec<DesiredService>,

    /// TOML manifest declaring services (see burrow.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the cloudflared binary (PATH lookup when omitted)
    #[arg(long, env = "BURROW_CLOUDFLARED")]
    pub daemon_binary: Option<PathBuf>,

    /// Verification attempts after launch
    #[arg(long, default_value_t = 5)]
    pub verify_retries: u32,

    /// Settle delay between verification attempts, in seconds
    #[arg(long, default_value_t = 2)]
    pub verify_delay: u64,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Parse a `name:hostname:port[:protocol]` service spec.
fn parse_service_spec(s: &str) -> Result<DesiredService, String> {
    let parts: Vec<&str> = s.split(':').collect();
    if !(3..=4).contains(&parts.len()) {
        return Err(format!(
            "invalid service spec '{s}' (expected name:hostname:port[:protocol])"
        ));
    }

    let port: u16 = parts[2]
        .parse()
        .map_err(|_| format!("invalid port '{}' in service spec '{s}'", parts[2]))?;

    let mut service = DesiredService::new(parts[0], parts[1], port);
    if let Some(protocol) = parts.get(3) {
        service.protocol = Some(protocol.parse().map_err(|e| format!("{e}"))?);
    }
    Ok(service)
}

/// Run the provisioning flow.
pub async fn run(args: UpArgs, dir: &Path) -> Result<()> {
    let loaded = args
        .config
        .as_deref()
        .map(manifest::load)
        .transpose()?
        .unwrap_or_default();

    // Manifest services first, --service flags appended after them; the
    // tunnel name prefers the flag over the manifest.
    let mut services = loaded.services;
    services.extend(args.services.iter().cloned());
    let tunnel_name = args
        .tunnel
        .clone()
        .or(loaded.tunnel)
        .unwrap_or_else(|| DEFAULT_TUNNEL_NAME.to_string());

    let route_plan = plan::plan(&tunnel_name, &services)?;
    info!(
        tunnel = %route_plan.tunnel_name,
        services = route_plan.total_services(),
        "planned routes"
    );

    let daemon = locate::ensure_binary_available(args.daemon_binary.as_deref())?;

    let client = CloudflareClient::new(&CloudflareConfig {
        api_email: args.api_email.clone(),
        api_key: args.api_key.clone(),
        account_id: args.account_id.clone(),
        zone_id: args.zone_id.clone(),
        zone_name: args.zone_name.clone(),
    })?;

    let paths = RunPaths::new(dir);
    let verify_opts = VerifyOptions {
        retries: args.verify_retries,
        settle_delay: Duration::from_secs(args.verify_delay),
        tail_lines: LOG_TAIL_LINES,
    };

    let report = provision(
        &client,
        &daemon,
        &paths,
        &route_plan,
        &args.account_id,
        &verify_opts,
    )
    .await?;

    print_report(&report, args.json)
}

#[allow(clippy::print_stdout)]
fn print_report(report: &TunnelReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!();
    println!(
        "  Tunnel '{}' is running (id {})",
        report.tunnel_name, report.tunnel_id
    );
    for service in &report.services {
        let note = match service.status {
            RouteStatus::Routed => "",
            RouteStatus::DnsFailed => "  (DNS not configured, set the record manually)",
        };
        println!(
            "    https://{} -> {}{note}",
            service.hostname, service.service_url
        );
    }
    println!();
    println!("    Config: {}", report.config_file.display());
    println!("    Log:    {}", report.log_file.display());
    println!("    PID:    {}", report.pid_file.display());
    if !report.converged {
        println!();
        println!(
            "    No connection registered yet; check the log if a hostname stays unreachable."
        );
    }
    println!();
    Ok(())
}
