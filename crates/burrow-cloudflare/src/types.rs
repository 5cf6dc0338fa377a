//! Serde models for the Cloudflare v4 REST API.

use serde::{Deserialize, Serialize};

/// Standard envelope every v4 endpoint responds with.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
    pub result: Option<T>,
}

/// One entry of the envelope's `errors` array.
#[derive(Debug, Deserialize)]
pub struct ApiMessage {
    pub code: i64,
    pub message: String,
}

/// A named tunnel as returned by the `cfd_tunnel` endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Tunnel {
    pub id: String,
    pub name: String,
}

/// A DNS zone.
#[derive(Debug, Clone, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
}

/// A DNS record.
#[derive(Debug, Clone, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub proxied: bool,
}

/// Body for creating a DNS record.
#[derive(Debug, Serialize)]
pub struct NewDnsRecord<'a> {
    #[serde(rename = "type")]
    pub record_type: &'a str,
    pub name: &'a str,
    pub content: &'a str,
    pub proxied: bool,
    pub ttl: u32,
}

/// Body for creating a named tunnel.
#[derive(Debug, Serialize)]
pub(crate) struct NewTunnel<'a> {
    pub name: &'a str,
    pub tunnel_secret: &'a str,
}

/// The reconciled identity of a named tunnel.
///
/// `secret` is `Some` only when the tunnel was created by this run: the
/// provider never re-exposes the secret of an existing tunnel. The absence
/// is a first-class state callers branch on (falling back to a connection
/// token), not an error. The two credential sources are deliberately not
/// collapsed into one type.
#[derive(Debug, Clone)]
pub struct TunnelIdentity {
    pub id: String,
    pub name: String,
    pub secret: Option<String>,
}
