//! End-to-end provisioning flow.
//!
//! Sequences remote reconciliation, artifact materialisation, daemon
//! launch and verification, and assembles the run report. DNS failures are
//! downgraded to per-service warnings at this boundary (a tunnel still
//! works without managed DNS and manual configuration remains possible);
//! every other failure propagates to the caller unmodified.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use burrow_cloudflare::CloudflareClient;
use burrow_core::RoutePlan;
use burrow_core::paths::RunPaths;

use crate::credentials::write_credentials;
use crate::ingress::{self, write_routing_config};
use crate::supervise::{self, ProcessError, VerificationOutcome, VerifyOptions};

/// Route status of one service in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    /// A DNS record routes the hostname to the tunnel.
    Routed,
    /// DNS reconciliation failed; the hostname needs manual DNS setup.
    DnsFailed,
}

/// Per-service entry of the run report.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceReport {
    pub name: String,
    pub hostname: String,
    /// Upstream the ingress rule resolved to, scheme included.
    pub service_url: String,
    pub status: RouteStatus,
}

/// Outcome of a provisioning run.
///
/// Besides the remote state, the report carries the durable paths (config,
/// log, PID file) a caller or a later invocation needs to verify or
/// diagnose the run after this process exits.
#[derive(Debug, Clone, Serialize)]
pub struct TunnelReport {
    pub success: bool,
    /// Whether a success marker was observed before the verification
    /// budget ran out. `false` means the daemon was alive but still
    /// negotiating. A soft success.
    pub converged: bool,
    pub tunnel_id: String,
    pub tunnel_name: String,
    pub services: Vec<ServiceReport>,
    pub config_file: PathBuf,
    pub log_file: PathBuf,
    pub pid_file: PathBuf,
}

/// Provision the tunnel described by `plan` and launch the daemon.
///
/// `daemon` is the cloudflared binary, already located by the caller.
/// Remote resources are reconciled idempotently: an existing tunnel or DNS
/// record with the expected name is reused, never recreated.
pub async fn provision(
    client: &CloudflareClient,
    daemon: &Path,
    paths: &RunPaths,
    plan: &RoutePlan,
    account_tag: &str,
    verify_opts: &VerifyOptions,
) -> Result<TunnelReport> {
    let identity = client
        .get_or_create_tunnel(&plan.tunnel_name)
        .await
        .with_context(|| format!("failed to reconcile tunnel '{}'", plan.tunnel_name))?;

    // The static secret only exists at creation time; a reused tunnel
    // authenticates with a connection token instead.
    let fallback_token = if identity.secret.is_none() {
        let token = client
            .get_connection_token(&identity.id)
            .await
            .context("failed to fetch a connection token for the existing tunnel")?;
        Some(token)
    } else {
        None
    };

    let mut services = Vec::with_capacity(plan.services.len());
    for service in &plan.services {
        let status = match client
            .get_or_create_dns_record(&service.hostname, &identity.id)
            .await
        {
            Ok(record) => {
                info!(
                    service = %service.name,
                    hostname = %service.hostname,
                    record_id = %record.id,
                    "route reconciled"
                );
                RouteStatus::Routed
            }
            Err(e) => {
                warn!(
                    service = %service.name,
                    hostname = %service.hostname,
                    error = %e,
                    "DNS reconciliation failed, continuing without a managed record"
                );
                RouteStatus::DnsFailed
            }
        };
        services.push(ServiceReport {
            name: service.name.clone(),
            hostname: service.hostname.clone(),
            service_url: ingress::service_url(service),
            status,
        });
    }

    let credentials_path =
        write_credentials(paths, account_tag, &identity, fallback_token.as_deref())
            .context("failed to write tunnel credentials")?;
    let config_path = write_routing_config(paths, &identity.id, &credentials_path, &plan.services)
        .context("failed to write routing config")?;

    let handle = supervise::launch(daemon, &config_path, paths)?;

    let outcome = supervise::verify(&handle.pid_file_path, &handle.log_path, verify_opts).await;
    let converged = match outcome {
        VerificationOutcome::Running { converged } => converged,
        VerificationOutcome::StillInitializing => false,
        VerificationOutcome::Died { log_tail } => {
            return Err(ProcessError::Died { log_tail }.into());
        }
        VerificationOutcome::LogReportedError { line, log_tail } => {
            return Err(ProcessError::LogReportedError { line, log_tail }.into());
        }
    };

    let report = TunnelReport {
        success: true,
        converged,
        tunnel_id: identity.id.clone(),
        tunnel_name: identity.name,
        services,
        config_file: handle.config_path,
        log_file: handle.log_path,
        pid_file: handle.pid_file_path,
    };

    info!(
        tunnel_id = %report.tunnel_id,
        services = report.services.len(),
        converged,
        "tunnel provisioned"
    );
    Ok(report)
}
