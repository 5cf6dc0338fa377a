//! Locating the cloudflared binary.
//!
//! Installing cloudflared is out of scope; this only resolves where an
//! installed binary lives: an explicit path when given, else `PATH`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// Resolve the daemon binary.
///
/// An explicit path must exist and is canonicalised; otherwise the name is
/// looked up on `PATH`.
pub fn ensure_binary_available(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return std::fs::canonicalize(path)
            .with_context(|| format!("cloudflared binary not found: {}", path.display()));
    }

    if let Some(found) = which("cloudflared") {
        tracing::debug!(path = %found.display(), "found cloudflared on PATH");
        return Ok(found);
    }

    bail!(
        "cloudflared not found on PATH; install it or pass --daemon-binary \
         (https://developers.cloudflare.com/cloudflare-one/connections/connect-networks/downloads/)"
    );
}

/// Minimal `PATH` lookup via `which`.
fn which(program: &str) -> Option<PathBuf> {
    let output = std::process::Command::new("which")
        .arg(program)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}
