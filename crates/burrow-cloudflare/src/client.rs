//! Cloudflare v4 REST API client.
//!
//! Authenticates with the key+email header pair, carries an explicit
//! request timeout, and wraps every call in the shared retry policy.
//! Creation calls are only reached through get-or-create flows that
//! re-check existence first, so a retried POST never races itself into
//! duplicate resources.

use std::time::Duration;

use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use burrow_core::RetryPolicy;

use crate::error::{CloudflareError, Result};
use crate::types::{ApiEnvelope, DnsRecord, NewDnsRecord, NewTunnel, Tunnel, TunnelIdentity, Zone};

const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

/// Routing suffix every tunnel CNAME points at.
const TUNNEL_ROUTING_SUFFIX: &str = "cfargotunnel.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for connecting to the Cloudflare API.
#[derive(Debug, Clone)]
pub struct CloudflareConfig {
    /// Account email paired with the API key.
    pub api_email: String,
    /// Global API key.
    pub api_key: String,
    /// Account the tunnels live under.
    pub account_id: String,
    /// Explicit zone id. Skips zone resolution entirely.
    pub zone_id: Option<String>,
    /// Explicit zone name, matched against the account's zone list.
    pub zone_name: Option<String>,
}

/// Cloudflare v4 REST API client.
#[derive(Debug)]
pub struct CloudflareClient {
    http: reqwest::Client,
    base_url: String,
    account_id: String,
    zone_id: Option<String>,
    zone_name: Option<String>,
    retry: RetryPolicy,
}

impl CloudflareClient {
    /// Create a client against the production API endpoint.
    pub fn new(config: &CloudflareConfig) -> Result<Self> {
        Self::with_base_url(config, DEFAULT_BASE_URL)
    }

    /// Create a client against a custom endpoint (tests, API proxies).
    pub fn with_base_url(config: &CloudflareConfig, base_url: &str) -> Result<Self> {
        if config.api_email.is_empty() {
            return Err(CloudflareError::Config("api_email is empty".into()));
        }
        if config.api_key.is_empty() {
            return Err(CloudflareError::Config("api_key is empty".into()));
        }
        if config.account_id.is_empty() {
            return Err(CloudflareError::Config("account_id is empty".into()));
        }

        let mut headers = HeaderMap::new();
        let email = HeaderValue::from_str(&config.api_email)
            .map_err(|_| CloudflareError::Config("api_email is not a valid header value".into()))?;
        let mut key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| CloudflareError::Config("api_key is not a valid header value".into()))?;
        key.set_sensitive(true);
        headers.insert("X-Auth-Email", email);
        headers.insert("X-Auth-Key", key);

        // Ensure a TLS crypto provider is installed (reqwest uses rustls-no-provider).
        // The `Err` case just means it was already installed — safe to ignore.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            account_id: config.account_id.clone(),
            zone_id: config.zone_id.clone(),
            zone_name: config.zone_name.clone(),
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the default retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build an account-scoped API URL.
    pub(crate) fn account_url(&self, path: &str) -> String {
        format!("{}/accounts/{}/{path}", self.base_url, self.account_id)
    }

    /// Build a zone-scoped API URL.
    pub(crate) fn zone_url(&self, zone_id: &str, path: &str) -> String {
        format!("{}/zones/{zone_id}/{path}", self.base_url)
    }

    /// Send a request and unwrap the standard response envelope.
    async fn request_json<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        parse_envelope(status, &body, what)
    }

    // =========================================================================
    // Tunnels
    // =========================================================================

    /// Look up a tunnel by its exact name. The returned identity never
    /// carries a secret: secrets exist only at creation time.
    pub async fn find_tunnel_by_name(&self, name: &str) -> Result<Option<TunnelIdentity>> {
        let url = self.account_url("cfd_tunnel");
        let url = url.as_str();
        let tunnels: Vec<Tunnel> = self
            .retry
            .run("list tunnels", || async move {
                self.request_json(
                    self.http
                        .get(url)
                        .query(&[("name", name), ("is_deleted", "false")]),
                    "list tunnels",
                )
                .await
            })
            .await?;

        Ok(tunnels.into_iter().find(|t| t.name == name).map(|t| {
            TunnelIdentity {
                id: t.id,
                name: t.name,
                secret: None,
            }
        }))
    }

    /// Create a tunnel with a freshly generated 32-byte secret.
    ///
    /// The secret is sent to the provider at creation time and returned in
    /// the identity; this is the only moment it is obtainable.
    pub async fn create_tunnel(&self, name: &str) -> Result<TunnelIdentity> {
        let secret = generate_tunnel_secret();
        let url = self.account_url("cfd_tunnel");
        let url = url.as_str();
        let body = &NewTunnel {
            name,
            tunnel_secret: &secret,
        };
        let tunnel: Tunnel = self
            .retry
            .run("create tunnel", || async move {
                self.request_json(self.http.post(url).json(body), "create tunnel")
                    .await
            })
            .await?;

        info!(tunnel_id = %tunnel.id, name = %tunnel.name, "created tunnel");
        Ok(TunnelIdentity {
            id: tunnel.id,
            name: tunnel.name,
            secret: Some(secret),
        })
    }

    /// Find a tunnel by name, creating it when absent.
    ///
    /// Idempotent on the tunnel itself: the same name always converges to
    /// the same id. The secret is asymmetric by design: `Some` only on the
    /// call that created the tunnel, `None` when it already existed (the
    /// provider never regenerates or re-exposes it). Callers branch on that
    /// to decide whether a connection token is needed instead.
    pub async fn get_or_create_tunnel(&self, name: &str) -> Result<TunnelIdentity> {
        if let Some(existing) = self.find_tunnel_by_name(name).await? {
            info!(tunnel_id = %existing.id, name = %existing.name, "reusing existing tunnel");
            return Ok(existing);
        }
        self.create_tunnel(name).await
    }

    /// Fetch the connection token for a tunnel.
    ///
    /// The token is the fallback credential for tunnels whose static secret
    /// is no longer obtainable. It is provider-issued and revocable, with
    /// different trust properties than a static secret; callers log a
    /// warning when they fall back to it.
    pub async fn get_connection_token(&self, tunnel_id: &str) -> Result<String> {
        let url = self.account_url(&format!("cfd_tunnel/{tunnel_id}/token"));
        let url = url.as_str();
        self.retry
            .run("fetch tunnel token", || async move {
                self.request_json(self.http.get(url), "fetch tunnel token")
                    .await
            })
            .await
    }

    // =========================================================================
    // Zones
    // =========================================================================

    /// List the zones visible to this API key.
    pub async fn list_zones(&self) -> Result<Vec<Zone>> {
        let url = format!("{}/zones", self.base_url);
        let url = url.as_str();
        self.retry
            .run("list zones", || async move {
                self.request_json(
                    self.http.get(url).query(&[("per_page", "50")]),
                    "list zones",
                )
                .await
            })
            .await
    }

    /// Resolve the zone id responsible for `domain`.
    ///
    /// An explicitly configured zone id wins outright; an explicitly
    /// configured zone name is matched against the zone list; otherwise the
    /// last two labels of `domain` are taken as a guessed root zone and
    /// matched against the list. The guess is best-effort and wrong for
    /// multi-label public suffixes (`example.co.uk` guesses `co.uk`);
    /// configure the zone explicitly in that case.
    pub async fn resolve_zone_for_domain(&self, domain: &str) -> Result<Option<String>> {
        if let Some(id) = &self.zone_id {
            debug!(zone_id = %id, "using explicitly configured zone id");
            return Ok(Some(id.clone()));
        }

        let zones = self.list_zones().await?;

        if let Some(name) = &self.zone_name {
            return Ok(zones.iter().find(|z| &z.name == name).map(|z| z.id.clone()));
        }

        let guess = root_domain(domain).unwrap_or_else(|| domain.to_string());
        Ok(zones.iter().find(|z| z.name == guess).map(|z| z.id.clone()))
    }

    // =========================================================================
    // DNS records
    // =========================================================================

    /// Look up a DNS record in a zone by its exact name.
    pub async fn find_dns_record(&self, zone_id: &str, name: &str) -> Result<Option<DnsRecord>> {
        let url = self.zone_url(zone_id, "dns_records");
        let url = url.as_str();
        let records: Vec<DnsRecord> = self
            .retry
            .run("list DNS records", || async move {
                self.request_json(self.http.get(url).query(&[("name", name)]), "list DNS records")
                    .await
            })
            .await?;
        Ok(records.into_iter().find(|r| r.name == name))
    }

    /// Create a DNS record in a zone.
    pub async fn create_dns_record(
        &self,
        zone_id: &str,
        record: &NewDnsRecord<'_>,
    ) -> Result<DnsRecord> {
        let url = self.zone_url(zone_id, "dns_records");
        let url = url.as_str();
        self.retry
            .run("create DNS record", || async move {
                self.request_json(self.http.post(url).json(record), "create DNS record")
                    .await
            })
            .await
    }

    /// Route `hostname` to a tunnel, reusing an existing record when one is
    /// already present.
    ///
    /// The zone is resolved from the hostname's root domain; a missing zone
    /// is a hard [`CloudflareError::NotFound`] at this layer (the
    /// orchestrator downgrades DNS failures to warnings, since a tunnel
    /// works without managed DNS).
    pub async fn get_or_create_dns_record(
        &self,
        hostname: &str,
        tunnel_id: &str,
    ) -> Result<DnsRecord> {
        let domain = root_domain(hostname).ok_or_else(|| {
            CloudflareError::Config(format!("cannot derive a domain from hostname '{hostname}'"))
        })?;

        let zone_id = self
            .resolve_zone_for_domain(&domain)
            .await?
            .ok_or_else(|| CloudflareError::NotFound(format!("no zone found for domain '{domain}'")))?;

        if let Some(existing) = self.find_dns_record(&zone_id, hostname).await? {
            info!(record_id = %existing.id, hostname, "reusing existing DNS record");
            return Ok(existing);
        }

        let content = tunnel_cname(tunnel_id);
        let record = self
            .create_dns_record(
                &zone_id,
                &NewDnsRecord {
                    record_type: "CNAME",
                    name: hostname,
                    content: &content,
                    proxied: true,
                    ttl: 1,
                },
            )
            .await?;

        info!(record_id = %record.id, hostname, content = %record.content, "created DNS record");
        Ok(record)
    }
}

/// Best-effort root domain: the last two dot-separated labels.
///
/// Known to be wrong for multi-label public suffixes (`example.co.uk`
/// yields `co.uk`); an explicit zone id or name is the escape hatch.
pub fn root_domain(hostname: &str) -> Option<String> {
    let labels: Vec<&str> = hostname.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() < 2 {
        return None;
    }
    Some(labels[labels.len() - 2..].join("."))
}

/// CNAME target for a tunnel id.
pub(crate) fn tunnel_cname(tunnel_id: &str) -> String {
    format!("{tunnel_id}.{TUNNEL_ROUTING_SUFFIX}")
}

/// Generate a fresh 32-byte tunnel secret, base64-encoded.
pub(crate) fn generate_tunnel_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Parse a response body as the standard envelope, mapping failures to the
/// error taxonomy.
pub(crate) fn parse_envelope<T: DeserializeOwned>(
    status: u16,
    body: &str,
    what: &str,
) -> Result<T> {
    match serde_json::from_str::<ApiEnvelope<T>>(body) {
        Ok(envelope) => check_envelope(status, envelope, what),
        Err(_) if status >= 400 => Err(CloudflareError::Api {
            status,
            message: format!("{what} failed with an unparseable response body"),
        }),
        Err(e) => Err(CloudflareError::Decode(format!("{what}: {e}"))),
    }
}

/// Unwrap an envelope, surfacing the provider-supplied error detail.
pub(crate) fn check_envelope<T>(
    status: u16,
    envelope: ApiEnvelope<T>,
    what: &str,
) -> Result<T> {
    if !envelope.success {
        let detail = envelope
            .errors
            .iter()
            .map(|e| format!("{} (code {})", e.message, e.code))
            .collect::<Vec<_>>()
            .join("; ");
        let message = if detail.is_empty() {
            format!("{what} failed")
        } else {
            detail
        };
        return Err(CloudflareError::Api { status, message });
    }

    envelope
        .result
        .ok_or_else(|| CloudflareError::Decode(format!("{what}: missing result payload")))
}
