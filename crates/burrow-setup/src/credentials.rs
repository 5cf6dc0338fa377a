//! Credential materialisation for the daemon.
//!
//! Writes the JSON secret bundle cloudflared authenticates with. This file
//! is the only place the tunnel secret (or its fallback token) touches
//! disk, so it is written atomically and restricted to owner read/write.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use burrow_cloudflare::TunnelIdentity;
use burrow_core::error::{Error, Result};
use burrow_core::{fsio, paths::RunPaths};

/// On-disk shape of the credentials file. Field names are the exact keys
/// cloudflared expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsFile {
    #[serde(rename = "AccountTag")]
    pub account_tag: String,
    #[serde(rename = "TunnelSecret")]
    pub tunnel_secret: String,
    #[serde(rename = "TunnelID")]
    pub tunnel_id: String,
}

/// Write the credentials file for a tunnel, returning its path.
///
/// The bundled secret is the identity's creation-time secret when present,
/// otherwise `fallback_token`. The token fallback is logged as a warning:
/// a connection token is a revocable provider credential with different
/// trust properties than a static secret, not an equivalent. Missing both
/// is a hard error.
pub fn write_credentials(
    paths: &RunPaths,
    account_tag: &str,
    identity: &TunnelIdentity,
    fallback_token: Option<&str>,
) -> Result<PathBuf> {
    let tunnel_secret = match (&identity.secret, fallback_token) {
        (Some(secret), _) => secret.clone(),
        (None, Some(token)) => {
            warn!(
                tunnel_id = %identity.id,
                "tunnel already existed, bundling a connection token instead of a static secret"
            );
            token.to_string()
        }
        (None, None) => {
            return Err(Error::Validation(format!(
                "no credential material for tunnel '{}': no creation secret and no fallback token",
                identity.name
            )));
        }
    };

    fsio::ensure_dir(paths.root())?;
    let path = paths.credentials(&identity.id);
    fsio::write_json_atomic(
        &path,
        &CredentialsFile {
            account_tag: account_tag.to_string(),
            tunnel_secret,
            tunnel_id: identity.id.clone(),
        },
    )?;
    restrict_permissions(&path)?;

    debug!(path = %path.display(), "credentials written");
    Ok(path)
}

/// Read a credentials file back.
pub fn read_credentials(path: &Path) -> Result<CredentialsFile> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Restrict the credentials file to owner read/write (0600) and verify the
/// restriction took effect. Verification is best-effort: where permission
/// bits cannot be confirmed this warns instead of failing.
#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    match fs::metadata(path) {
        Ok(meta) => {
            let mode = meta.permissions().mode() & 0o777;
            if mode != 0o600 {
                warn!(
                    path = %path.display(),
                    mode = format!("{mode:o}"),
                    "credentials file permissions could not be restricted to owner-only"
                );
            }
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "could not verify credentials file permissions"
            );
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(path: &Path) -> Result<()> {
    warn!(
        path = %path.display(),
        "owner-only permissions cannot be enforced on this platform"
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn identity(secret: Option<&str>) -> TunnelIdentity {
        TunnelIdentity {
            id: "t-123".into(),
            name: "ci-tunnel".into(),
            secret: secret.map(String::from),
        }
    }

    #[test]
    fn creation_secret_wins_over_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(dir.path());

        let path =
            write_credentials(&paths, "acc-1", &identity(Some("s3cret")), Some("token")).unwrap();

        let creds = read_credentials(&path).unwrap();
        assert_eq!(creds.tunnel_secret, "s3cret");
    }

    #[test]
    fn fallback_token_used_when_secret_absent() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(dir.path());

        let path = write_credentials(&paths, "acc-1", &identity(None), Some("T")).unwrap();

        let creds = read_credentials(&path).unwrap();
        assert_eq!(creds.tunnel_secret, "T");
    }

    #[test]
    fn missing_secret_and_token_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(dir.path());

        let err = write_credentials(&paths, "acc-1", &identity(None), None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn roundtrip_preserves_the_triple() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(dir.path());

        let path =
            write_credentials(&paths, "acc-9", &identity(Some("material")), None).unwrap();
        let creds = read_credentials(&path).unwrap();

        assert_eq!(
            creds,
            CredentialsFile {
                account_tag: "acc-9".into(),
                tunnel_secret: "material".into(),
                tunnel_id: "t-123".into(),
            }
        );
    }

    #[test]
    fn file_uses_cloudflared_key_names() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(dir.path());

        let path = write_credentials(&paths, "acc-1", &identity(Some("s")), None).unwrap();
        let raw = fs::read_to_string(&path).unwrap();

        assert!(raw.contains("\"AccountTag\""));
        assert!(raw.contains("\"TunnelSecret\""));
        assert!(raw.contains("\"TunnelID\""));
    }

    #[cfg(unix)]
    #[test]
    fn credentials_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(dir.path());

        let path = write_credentials(&paths, "acc-1", &identity(Some("s")), None).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "credentials file should be owner-only (0600)");
    }

    #[test]
    fn file_is_named_after_the_tunnel_id() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(dir.path());

        let path = write_credentials(&paths, "acc-1", &identity(Some("s")), None).unwrap();
        assert_eq!(path.file_name().unwrap(), "t-123.json");
    }
}
