//! Burrow CLI.
//!
//! Provisions a Cloudflare Tunnel for the declared services and leaves a
//! supervised cloudflared daemon running behind it, with enough on-disk
//! evidence (PID file, log, config) to check on or stop the daemon from a
//! later invocation.

mod commands;
mod locate;
mod manifest;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;

use burrow_core::paths::DEFAULT_RUN_DIR;
use burrow_core::tracing_init::init_tracing;
use burrow_setup::ProcessError;

use commands::up::UpArgs;

#[derive(Debug, Parser)]
#[command(name = "burrow", version, about = "Expose services through a Cloudflare Tunnel")]
struct Cli {
    /// Run directory for generated artifacts (config, credentials, log, PID file)
    #[arg(long, global = true, default_value = DEFAULT_RUN_DIR)]
    dir: PathBuf,

    /// Emit structured JSON log lines
    #[arg(long, global = true, env = "BURROW_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Reconcile remote resources, then launch and verify the daemon
    Up(UpArgs),
    /// Report the liveness of a previously launched daemon
    Status,
    /// Stop a previously launched daemon via its PID file
    Stop,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing("info", cli.log_json);

    let result = match cli.command {
        Commands::Up(args) => commands::up::run(args, &cli.dir).await,
        Commands::Status => commands::status::run(&cli.dir),
        Commands::Stop => commands::stop::run(&cli.dir),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

/// Map error kinds to process exit codes: bad input 2, daemon failures 3,
/// everything else 1.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<ProcessError>().is_some() {
        3
    } else if matches!(
        err.downcast_ref::<burrow_core::Error>(),
        Some(burrow_core::Error::Validation(_))
    ) {
        2
    } else {
        1
    }
}
