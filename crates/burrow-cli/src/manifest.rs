//! Optional TOML manifest (`burrow.toml`) declaring desired services.
//!
//! The manifest is the checked-in way to declare services; `--service`
//! flags add to it and flag-level settings win over manifest-level ones.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use burrow_core::DesiredService;

/// On-disk manifest shape.
///
/// ```toml
/// tunnel = "ci-tunnel"
///
/// [[service]]
/// name = "web"
/// hostname = "app.example.com"
/// port = 3000
///
/// [[service]]
/// name = "pg"
/// hostname = "db.example.com"
/// address = "10.0.0.5"
/// port = 5432
/// protocol = "tcp"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Manifest {
    /// Tunnel name the services share.
    #[serde(default)]
    pub tunnel: Option<String>,
    /// Declared services.
    #[serde(default, rename = "service")]
    pub services: Vec<DesiredService>,
}

/// Load a manifest file.
pub fn load(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("failed to parse manifest {}", path.display()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use burrow_core::Protocol;

    use super::*;

    #[test]
    fn parses_a_full_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("burrow.toml");
        std::fs::write(
            &path,
            r#"
tunnel = "ci-tunnel"

[[service]]
name = "web"
hostname = "app.example.com"
port = 3000

[[service]]
name = "pg"
hostname = "db.example.com"
address = "10.0.0.5"
port = 5432
protocol = "tcp"
"#,
        )
        .unwrap();

        let manifest = load(&path).unwrap();

        assert_eq!(manifest.tunnel.as_deref(), Some("ci-tunnel"));
        assert_eq!(manifest.services.len(), 2);
        assert_eq!(manifest.services[0].address, "localhost");
        assert_eq!(manifest.services[1].address, "10.0.0.5");
        assert_eq!(manifest.services[1].protocol, Some(Protocol::Tcp));
    }

    #[test]
    fn empty_manifest_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("burrow.toml");
        std::fs::write(&path, "").unwrap();

        let manifest = load(&path).unwrap();
        assert!(manifest.tunnel.is_none());
        assert!(manifest.services.is_empty());
    }

    #[test]
    fn missing_manifest_is_an_error() {
        let err = load(Path::new("/nonexistent/burrow.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read manifest"));
    }
}
