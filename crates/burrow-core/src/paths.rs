//! Run-directory layout for on-disk artifacts.
//!
//! Everything a later invocation needs to find the daemon again (PID file,
//! log, generated config, credentials) lives under one run directory.
//! `status` and `stop` resolve the daemon purely through these files, never
//! through in-memory state. Running two instances against the same directory
//! is unsupported: each file has a single writer per run.

use std::path::{Path, PathBuf};

/// Default run directory, relative to the invoking process's working dir.
pub const DEFAULT_RUN_DIR: &str = ".burrow";

/// Generated cloudflared routing config.
pub const CONFIG_FILENAME: &str = "config.yml";
/// Combined stdout/stderr of the launched daemon.
pub const LOG_FILENAME: &str = "cloudflared.log";
/// Decimal PID of the launched daemon.
pub const PID_FILENAME: &str = "cloudflared.pid";

/// Filesystem layout of a single run directory.
#[derive(Debug, Clone)]
pub struct RunPaths {
    root: PathBuf,
}

impl RunPaths {
    /// Lay out paths under the given run directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The run directory itself.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the generated routing config.
    pub fn config(&self) -> PathBuf {
        self.root.join(CONFIG_FILENAME)
    }

    /// Path of the credentials file for a tunnel. Named `<tunnel_id>.json`,
    /// the naming cloudflared itself uses for `credentials-file`.
    pub fn credentials(&self, tunnel_id: &str) -> PathBuf {
        self.root.join(format!("{tunnel_id}.json"))
    }

    /// Path of the daemon log file.
    pub fn log(&self) -> PathBuf {
        self.root.join(LOG_FILENAME)
    }

    /// Path of the daemon PID file.
    pub fn pid_file(&self) -> PathBuf {
        self.root.join(PID_FILENAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_paths_live_under_root() {
        let paths = RunPaths::new("/tmp/run");

        assert_eq!(paths.config(), Path::new("/tmp/run/config.yml"));
        assert_eq!(paths.log(), Path::new("/tmp/run/cloudflared.log"));
        assert_eq!(paths.pid_file(), Path::new("/tmp/run/cloudflared.pid"));
        assert_eq!(
            paths.credentials("a1b2c3"),
            Path::new("/tmp/run/a1b2c3.json")
        );
    }
}
