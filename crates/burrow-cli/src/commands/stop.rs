//! The `stop` subcommand: terminate the daemon via the PID file.

use std::path::Path;

use anyhow::Result;
use tracing::info;

use burrow_core::paths::RunPaths;
use burrow_setup::supervise;

/// Stop a previously launched daemon. A missing or stale PID file is not
/// an error: the daemon is already gone, which is the requested state.
pub fn run(dir: &Path) -> Result<()> {
    let paths = RunPaths::new(dir);

    if !supervise::stop(&paths.pid_file())? {
        info!(dir = %dir.display(), "no running daemon to stop");
    }
    Ok(())
}
