//! Desired-service model and route planning.
//!
//! The planner turns a flat list of desired services into a single-tunnel,
//! multi-route plan. It is a pure function over its inputs, no I/O, so the
//! same plan can back both a real run and a dry run.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upstream protocol for an ingress rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
    Ssh,
    Tcp,
}

impl Protocol {
    /// The URL scheme cloudflared expects in an ingress `service` entry.
    pub const fn scheme(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Ssh => "ssh",
            Self::Tcp => "tcp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            "ssh" => Ok(Self::Ssh),
            "tcp" => Ok(Self::Tcp),
            other => Err(Error::Validation(format!(
                "unknown protocol: {other} (expected http, https, ssh or tcp)"
            ))),
        }
    }
}

/// A service on this machine that should become reachable through the tunnel.
///
/// Declared by the caller and immutable for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesiredService {
    /// Short identifier, unique within the run.
    pub name: String,
    /// Public hostname the service is reached under.
    pub hostname: String,
    /// Upstream address the daemon forwards to.
    #[serde(default = "default_address")]
    pub address: String,
    /// Upstream port.
    pub port: u16,
    /// Explicit protocol. When `None`, the scheme is inferred from the
    /// port and name at config-rendering time; an explicit value always
    /// wins over inference.
    #[serde(default)]
    pub protocol: Option<Protocol>,
}

fn default_address() -> String {
    "localhost".to_string()
}

impl DesiredService {
    /// Create a service with the default upstream address and no explicit
    /// protocol.
    pub fn new(name: impl Into<String>, hostname: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            hostname: hostname.into(),
            address: default_address(),
            port,
            protocol: None,
        }
    }
}

/// A single-tunnel, multi-route plan derived from the desired services.
///
/// Ingress rule order follows `services` order (first match wins), so the
/// plan preserves the caller's input ordering.
#[derive(Debug, Clone)]
pub struct RoutePlan {
    /// Name of the one tunnel fronting every service in this run.
    pub tunnel_name: String,
    /// Services in caller order, deduplicated by name.
    pub services: Vec<DesiredService>,
}

impl RoutePlan {
    /// Number of services routed by this plan.
    pub fn total_services(&self) -> usize {
        self.services.len()
    }
}

/// Build the route plan for a run.
///
/// Groups every service under the single tunnel name, deduplicates services
/// by name (first occurrence wins), and rejects hostname collisions.
/// Deterministic for a given input ordering.
pub fn plan(tunnel_name: &str, services: &[DesiredService]) -> Result<RoutePlan> {
    if tunnel_name.is_empty() {
        return Err(Error::Validation("tunnel name must not be empty".into()));
    }
    if services.is_empty() {
        return Err(Error::Validation(
            "at least one service is required".into(),
        ));
    }

    let mut seen_names: HashSet<String> = HashSet::new();
    let mut seen_hostnames: HashSet<String> = HashSet::new();
    let mut planned = Vec::with_capacity(services.len());

    for service in services {
        if service.name.is_empty() {
            return Err(Error::Validation("service name must not be empty".into()));
        }
        if service.hostname.is_empty() {
            return Err(Error::Validation(format!(
                "service '{}' has an empty hostname",
                service.name
            )));
        }
        if service.port == 0 {
            return Err(Error::Validation(format!(
                "service '{}' has port 0",
                service.name
            )));
        }

        if !seen_names.insert(service.name.clone()) {
            tracing::warn!(
                service = %service.name,
                "duplicate service name, keeping the first declaration"
            );
            continue;
        }

        // Hostnames are case-insensitive in DNS.
        if !seen_hostnames.insert(service.hostname.to_ascii_lowercase()) {
            return Err(Error::Validation(format!(
                "hostname '{}' is declared by more than one service",
                service.hostname
            )));
        }

        planned.push(service.clone());
    }

    Ok(RoutePlan {
        tunnel_name: tunnel_name.to_string(),
        services: planned,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn web(name: &str, hostname: &str, port: u16) -> DesiredService {
        DesiredService::new(name, hostname, port)
    }

    #[test]
    fn plan_keeps_input_order() {
        let services = vec![
            web("web", "app.example.com", 3000),
            web("api", "api.example.com", 8080),
            web("db", "db.example.com", 5432),
        ];
        let plan = plan("ci-tunnel", &services).unwrap();

        assert_eq!(plan.tunnel_name, "ci-tunnel");
        assert_eq!(plan.total_services(), 3);
        let names: Vec<&str> = plan.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["web", "api", "db"]);
    }

    #[test]
    fn plan_is_deterministic() {
        let services = vec![
            web("web", "app.example.com", 3000),
            web("api", "api.example.com", 8080),
        ];
        let first = plan("t", &services).unwrap();
        let second = plan("t", &services).unwrap();

        let hosts = |p: &RoutePlan| {
            p.services
                .iter()
                .map(|s| s.hostname.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(hosts(&first), hosts(&second));
    }

    #[test]
    fn duplicate_names_deduplicated_first_wins() {
        let services = vec![
            web("web", "one.example.com", 3000),
            web("web", "two.example.com", 4000),
        ];
        let plan = plan("t", &services).unwrap();

        assert_eq!(plan.total_services(), 1);
        assert_eq!(plan.services[0].hostname, "one.example.com");
    }

    #[test]
    fn duplicate_hostnames_rejected() {
        let services = vec![
            web("web", "app.example.com", 3000),
            web("api", "APP.example.com", 8080),
        ];
        let err = plan("t", &services).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn empty_inputs_rejected() {
        assert!(plan("", &[web("a", "a.example.com", 1)]).is_err());
        assert!(plan("t", &[]).is_err());
        assert!(plan("t", &[web("", "a.example.com", 1)]).is_err());
        assert!(plan("t", &[web("a", "", 1)]).is_err());
        assert!(plan("t", &[web("a", "a.example.com", 0)]).is_err());
    }

    #[test]
    fn protocol_parses_known_schemes() {
        assert_eq!("https".parse::<Protocol>().unwrap(), Protocol::Https);
        assert_eq!("ssh".parse::<Protocol>().unwrap(), Protocol::Ssh);
        assert!("gopher".parse::<Protocol>().is_err());
    }
}
