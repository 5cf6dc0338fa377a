//! Daemon process supervision.
//!
//! Launches cloudflared detached so it outlives this process, then
//! verifies convergence through the only signals a separate invocation can
//! also see: the PID file and the log file. `status` and `stop` go through
//! the same durable files; a launched daemon is never tracked by an
//! in-memory handle alone.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use burrow_core::{fsio, paths::RunPaths};

/// Log lines surfaced with failure outcomes.
pub const LOG_TAIL_LINES: usize = 20;

/// Markers cloudflared prints once a tunnel connection is registered.
const SUCCESS_MARKERS: &[&str] = &["Registered tunnel connection", "Connection established"];

/// zerolog level tokens cloudflared uses for error/fatal lines.
const ERROR_MARKERS: &[&str] = &["ERR", "FTL"];

/// Errors from launching or supervising the daemon.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to launch daemon: {0}")]
    Launch(String),

    #[error("daemon died during startup; last log lines:\n{}", log_tail.join("\n"))]
    Died { log_tail: Vec<String> },

    #[error("daemon log reported an error: {line}\nlast log lines:\n{}", log_tail.join("\n"))]
    LogReportedError { line: String, log_tail: Vec<String> },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle to a daemon launched by this run.
///
/// Only a convenience for the launching process: the durable identity is
/// the PID file, which any later invocation resolves on its own.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pub pid: u32,
    pub config_path: PathBuf,
    pub log_path: PathBuf,
    pub pid_file_path: PathBuf,
}

/// Result of a verification attempt, and of the bounded loop overall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The daemon is up. `converged` is false when the attempt budget ran
    /// out before a success marker appeared: the process is alive and may
    /// simply still be negotiating its first connection, so this is a soft
    /// success.
    Running { converged: bool },
    /// Transient: drives another verification attempt.
    StillInitializing,
    /// The process disappeared (or its PID file never showed up).
    Died { log_tail: Vec<String> },
    /// The log contains an error marker. Terminal, never retried.
    LogReportedError { line: String, log_tail: Vec<String> },
}

/// Knobs for the verification loop.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Maximum verification attempts.
    pub retries: u32,
    /// Settle delay at the start of every attempt.
    pub settle_delay: Duration,
    /// Log lines surfaced with failures.
    pub tail_lines: usize,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            retries: 5,
            settle_delay: Duration::from_secs(2),
            tail_lines: LOG_TAIL_LINES,
        }
    }
}

/// Liveness of a previously launched daemon, resolved purely through the
/// PID file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonStatus {
    /// No PID file under the run directory.
    NotRunning,
    /// A PID file exists but the process is gone.
    Stale(u32),
    /// The recorded process is alive.
    Running(u32),
}

/// Launch the daemon detached, recording its PID.
///
/// stdout/stderr are redirected into one append-mode log file opened
/// before the spawn; the parent's descriptors close right after, the child
/// keeps its own. The child runs in its own process group and is never
/// waited on; its lifetime is independent of ours.
pub fn launch(
    daemon: &Path,
    config_path: &Path,
    paths: &RunPaths,
) -> Result<ProcessHandle, ProcessError> {
    fsio::ensure_dir(paths.root())
        .map_err(|e| ProcessError::Launch(format!("cannot create run directory: {e}")))?;

    let log_path = paths.log();
    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    let stderr_log = log.try_clone()?;

    let mut command = Command::new(daemon);
    command
        .arg("tunnel")
        .arg("--config")
        .arg(config_path)
        .arg("run")
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(stderr_log));

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let child = command
        .spawn()
        .map_err(|e| ProcessError::Launch(format!("{}: {e}", daemon.display())))?;
    let pid = child.id();
    drop(child);

    let pid_file_path = paths.pid_file();
    fsio::write_atomic(&pid_file_path, &format!("{pid}\n"))
        .map_err(|e| ProcessError::Launch(format!("cannot record daemon pid: {e}")))?;

    info!(pid, log = %log_path.display(), "daemon launched");
    Ok(ProcessHandle {
        pid,
        config_path: config_path.to_path_buf(),
        log_path,
        pid_file_path,
    })
}

/// Probe whether a process exists without disturbing it (signal 0).
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    i32::try_from(pid).is_ok_and(|p| kill(Pid::from_raw(p), None).is_ok())
}

/// Without a signal probe, liveness cannot be confirmed; report alive and
/// let the log markers decide.
#[cfg(not(unix))]
pub fn process_alive(_pid: u32) -> bool {
    true
}

/// Read the PID recorded in a PID file, if any.
pub fn read_pid_file(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Last `n` lines of the log file. A missing or unreadable log yields
/// nothing rather than an error: the log is diagnostics, not state.
pub fn read_log_tail(path: &Path, n: usize) -> Vec<String> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].iter().map(|l| (*l).to_string()).collect()
}

enum LogSignal {
    Success(String),
    Error(String),
}

/// Scan a log tail for markers. Error markers dominate: a tunnel that
/// logged an error is failed even if an earlier line looked healthy.
fn scan_log_tail(lines: &[String]) -> Option<LogSignal> {
    for line in lines {
        if ERROR_MARKERS.iter().any(|m| line.contains(m)) {
            return Some(LogSignal::Error(line.clone()));
        }
    }
    for line in lines {
        if SUCCESS_MARKERS.iter().any(|m| line.contains(m)) {
            return Some(LogSignal::Success(line.clone()));
        }
    }
    None
}

/// One verification attempt against the durable signals.
///
/// `final_attempt` decides how inconclusive evidence is graded: a missing
/// PID file or a dead process stays `StillInitializing` until the budget
/// is spent, while an error marker is terminal on any attempt and a
/// marker-less live daemon on the last attempt is a soft success.
pub fn check_attempt(
    pid_file: &Path,
    log_file: &Path,
    tail_lines: usize,
    final_attempt: bool,
) -> VerificationOutcome {
    let Some(pid) = read_pid_file(pid_file) else {
        if final_attempt {
            return VerificationOutcome::Died {
                log_tail: read_log_tail(log_file, tail_lines),
            };
        }
        return VerificationOutcome::StillInitializing;
    };

    if !process_alive(pid) {
        if final_attempt {
            return VerificationOutcome::Died {
                log_tail: read_log_tail(log_file, tail_lines),
            };
        }
        return VerificationOutcome::StillInitializing;
    }

    let tail = read_log_tail(log_file, tail_lines);
    match scan_log_tail(&tail) {
        Some(LogSignal::Error(line)) => VerificationOutcome::LogReportedError {
            line,
            log_tail: tail,
        },
        Some(LogSignal::Success(line)) => {
            debug!(marker = %line, "daemon reported a registered connection");
            VerificationOutcome::Running { converged: true }
        }
        None if final_attempt => VerificationOutcome::Running { converged: false },
        None => VerificationOutcome::StillInitializing,
    }
}

/// Bounded verification loop over [`check_attempt`].
///
/// Sleeps the settle delay before every attempt, stops early on any
/// terminal outcome, and grades the final attempt per the rules above.
pub async fn verify(
    pid_file: &Path,
    log_file: &Path,
    opts: &VerifyOptions,
) -> VerificationOutcome {
    let retries = opts.retries.max(1);

    for attempt in 1..=retries {
        sleep(opts.settle_delay).await;

        match check_attempt(pid_file, log_file, opts.tail_lines, attempt == retries) {
            VerificationOutcome::StillInitializing => {
                debug!(attempt, retries, "daemon still initializing");
            }
            VerificationOutcome::Running { converged } => {
                if !converged {
                    warn!(
                        attempts = retries,
                        "no success marker observed before the attempt budget ran out; \
                         the daemon is alive and may still be negotiating its first connection"
                    );
                }
                return VerificationOutcome::Running { converged };
            }
            terminal => return terminal,
        }
    }

    // retries >= 1, and the final attempt always returns above.
    VerificationOutcome::StillInitializing
}

/// Resolve the liveness of a previously launched daemon.
pub fn status(pid_file: &Path) -> DaemonStatus {
    match read_pid_file(pid_file) {
        None => DaemonStatus::NotRunning,
        Some(pid) if process_alive(pid) => DaemonStatus::Running(pid),
        Some(pid) => DaemonStatus::Stale(pid),
    }
}

/// Stop a previously launched daemon via its PID file.
///
/// Returns `true` when a termination signal was delivered. The PID file is
/// removed whether the process was alive or stale.
pub fn stop(pid_file: &Path) -> Result<bool, ProcessError> {
    match status(pid_file) {
        DaemonStatus::NotRunning => Ok(false),
        DaemonStatus::Stale(pid) => {
            warn!(pid, "removing stale PID file for a daemon that is already gone");
            fs::remove_file(pid_file)?;
            Ok(false)
        }
        DaemonStatus::Running(pid) => {
            terminate(pid)?;
            fs::remove_file(pid_file)?;
            info!(pid, "daemon stopped");
            Ok(true)
        }
    }
}

#[cfg(unix)]
fn terminate(pid: u32) -> Result<(), ProcessError> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let pid = i32::try_from(pid)
        .map_err(|_| ProcessError::Launch(format!("pid {pid} out of range")))?;
    kill(Pid::from_raw(pid), Signal::SIGTERM)
        .map_err(|e| ProcessError::Launch(format!("failed to signal pid {pid}: {e}")))?;
    Ok(())
}

#[cfg(not(unix))]
fn terminate(pid: u32) -> Result<(), ProcessError> {
    Err(ProcessError::Launch(format!(
        "cannot signal pid {pid} on this platform"
    )))
}
