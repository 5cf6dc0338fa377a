//! Routing-config materialisation and scheme inference.
//!
//! Renders the cloudflared config document: `tunnel`, `credentials-file`,
//! and an ordered `ingress` list with one rule per service followed by the
//! mandatory catch-all.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use burrow_core::error::Result;
use burrow_core::paths::RunPaths;
use burrow_core::{DesiredService, Protocol, fsio};

/// Ports that default to plain HTTP when no protocol is declared.
const HTTP_DEV_PORTS: &[u16] = &[80, 3000, 4200, 5000, 5173, 8000, 8080, 8888];

/// Ports that default to raw TCP: common databases and caches.
const TCP_SERVICE_PORTS: &[u16] = &[3306, 5432, 6379, 9200, 11211, 27017];

/// Infer the upstream scheme for a service.
///
/// A convenience default, not a correctness guarantee: an explicitly
/// declared protocol always wins. SSH ports (22, 2222) or an "ssh" name
/// infer `ssh`, 443 infers `https`, well-known dev ports infer `http`,
/// database/cache ports and everything unrecognised fall back to `tcp`.
pub fn infer_scheme(service: &DesiredService) -> Protocol {
    if let Some(protocol) = service.protocol {
        return protocol;
    }
    if matches!(service.port, 22 | 2222) || service.name.to_ascii_lowercase().contains("ssh") {
        return Protocol::Ssh;
    }
    if service.port == 443 {
        return Protocol::Https;
    }
    if HTTP_DEV_PORTS.contains(&service.port) {
        return Protocol::Http;
    }
    if TCP_SERVICE_PORTS.contains(&service.port) {
        return Protocol::Tcp;
    }
    Protocol::Tcp
}

/// Upstream URL for a service's ingress rule, with the scheme resolved.
pub fn service_url(service: &DesiredService) -> String {
    format!(
        "{}://{}:{}",
        infer_scheme(service).scheme(),
        service.address,
        service.port
    )
}

/// Render the routing config document.
///
/// Rule order before the catch-all is significant (first match wins) and
/// follows the input order; the `http_status:404` catch-all is always the
/// last entry.
pub fn render_routing_config(
    tunnel_id: &str,
    credentials_path: &Path,
    services: &[DesiredService],
) -> String {
    let mut doc = String::new();
    let _ = writeln!(doc, "tunnel: {tunnel_id}");
    let _ = writeln!(doc, "credentials-file: {}", credentials_path.display());
    doc.push('\n');
    doc.push_str("ingress:\n");
    for service in services {
        let _ = writeln!(doc, "  - hostname: {}", service.hostname);
        let _ = writeln!(doc, "    service: {}", service_url(service));
    }
    doc.push_str("  - service: http_status:404\n");
    doc
}

/// Write the routing config, returning its path.
pub fn write_routing_config(
    paths: &RunPaths,
    tunnel_id: &str,
    credentials_path: &Path,
    services: &[DesiredService],
) -> Result<PathBuf> {
    fsio::ensure_dir(paths.root())?;
    let path = paths.config();
    fsio::write_atomic(
        &path,
        &render_routing_config(tunnel_id, credentials_path, services),
    )?;
    Ok(path)
}
