//! The `status` subcommand: liveness via the PID file, nothing else.

use std::path::Path;

use anyhow::{Result, bail};

use burrow_core::paths::RunPaths;
use burrow_setup::DaemonStatus;
use burrow_setup::supervise;

/// Report the daemon's liveness. Exits non-zero when it is not running, so
/// CI steps can gate on the result.
#[allow(clippy::print_stdout)]
pub fn run(dir: &Path) -> Result<()> {
    let paths = RunPaths::new(dir);

    match supervise::status(&paths.pid_file()) {
        DaemonStatus::Running(pid) => {
            println!("cloudflared is running (pid {pid})");
            for line in supervise::read_log_tail(&paths.log(), 5) {
                println!("  {line}");
            }
            Ok(())
        }
        DaemonStatus::Stale(pid) => {
            bail!("cloudflared is gone (stale PID file records pid {pid})")
        }
        DaemonStatus::NotRunning => {
            bail!("no daemon has been launched from {}", dir.display())
        }
    }
}
