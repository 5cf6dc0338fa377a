//! Tests for the Cloudflare API client and types.

#![allow(clippy::unwrap_used, clippy::panic)]

use base64::Engine as _;

use super::client::{
    CloudflareClient, CloudflareConfig, check_envelope, parse_envelope, root_domain, tunnel_cname,
};
use super::error::CloudflareError;
use super::types::{ApiEnvelope, DnsRecord, Tunnel, Zone};

fn config() -> CloudflareConfig {
    CloudflareConfig {
        api_email: "ops@example.com".into(),
        api_key: "test-key".into(),
        account_id: "acc-123".into(),
        zone_id: None,
        zone_name: None,
    }
}

// =============================================================================
// Client construction tests
// =============================================================================

#[test]
fn empty_email_returns_config_error() {
    let mut cfg = config();
    cfg.api_email = String::new();
    let err = CloudflareClient::new(&cfg).unwrap_err();
    assert!(matches!(err, CloudflareError::Config(_)));
}

#[test]
fn empty_key_returns_config_error() {
    let mut cfg = config();
    cfg.api_key = String::new();
    let err = CloudflareClient::new(&cfg).unwrap_err();
    assert!(matches!(err, CloudflareError::Config(_)));
}

#[test]
fn empty_account_returns_config_error() {
    let mut cfg = config();
    cfg.account_id = String::new();
    let err = CloudflareClient::new(&cfg).unwrap_err();
    assert!(matches!(err, CloudflareError::Config(_)));
}

#[test]
fn valid_config_creates_client() {
    assert!(CloudflareClient::new(&config()).is_ok());
}

#[test]
fn trailing_slash_stripped_from_base_url() {
    let client = CloudflareClient::with_base_url(&config(), "https://api.test/v4/").unwrap();
    let url = client.account_url("cfd_tunnel");
    assert_eq!(url, "https://api.test/v4/accounts/acc-123/cfd_tunnel");
}

#[test]
fn zone_url_constructed_correctly() {
    let client = CloudflareClient::with_base_url(&config(), "https://api.test/v4").unwrap();
    assert_eq!(
        client.zone_url("z9", "dns_records"),
        "https://api.test/v4/zones/z9/dns_records"
    );
}

// =============================================================================
// Envelope tests
// =============================================================================

#[test]
fn envelope_deserializes_tunnel_list() {
    let body = r#"{
        "success": true,
        "errors": [],
        "messages": [],
        "result": [
            {"id": "t-1", "name": "ci-tunnel", "created_at": "2024-01-01T00:00:00Z"}
        ]
    }"#;
    let tunnels: Vec<Tunnel> = parse_envelope(200, body, "list tunnels").unwrap();
    assert_eq!(tunnels.len(), 1);
    assert_eq!(tunnels[0].id, "t-1");
    assert_eq!(tunnels[0].name, "ci-tunnel");
}

#[test]
fn envelope_deserializes_token_string() {
    let body = r#"{"success": true, "errors": [], "result": "opaque-token"}"#;
    let token: String = parse_envelope(200, body, "fetch tunnel token").unwrap();
    assert_eq!(token, "opaque-token");
}

#[test]
fn envelope_failure_surfaces_provider_detail() {
    let body = r#"{
        "success": false,
        "errors": [{"code": 10000, "message": "Authentication error"}],
        "result": null
    }"#;
    let err = parse_envelope::<Vec<Zone>>(403, body, "list zones").unwrap_err();
    match err {
        CloudflareError::Api { status, message } => {
            assert_eq!(status, 403);
            assert!(message.contains("Authentication error"));
            assert!(message.contains("10000"));
        }
        other => panic!("expected Api error, got: {other}"),
    }
}

#[test]
fn unparseable_error_body_maps_to_api_error() {
    let err = parse_envelope::<Vec<Zone>>(502, "<html>bad gateway</html>", "list zones")
        .unwrap_err();
    assert!(matches!(err, CloudflareError::Api { status: 502, .. }));
}

#[test]
fn unparseable_success_body_maps_to_decode_error() {
    let err = parse_envelope::<Vec<Zone>>(200, "not json", "list zones").unwrap_err();
    assert!(matches!(err, CloudflareError::Decode(_)));
}

#[test]
fn missing_result_on_success_is_decode_error() {
    let envelope: ApiEnvelope<Vec<Zone>> =
        serde_json::from_str(r#"{"success": true, "errors": [], "result": null}"#).unwrap();
    let err = check_envelope(200, envelope, "list zones").unwrap_err();
    assert!(matches!(err, CloudflareError::Decode(_)));
}

#[test]
fn dns_record_deserializes_with_type_field() {
    let body = r#"{
        "success": true,
        "errors": [],
        "result": [{
            "id": "r-1",
            "type": "CNAME",
            "name": "app.example.com",
            "content": "t-1.cfargotunnel.com",
            "proxied": true
        }]
    }"#;
    let records: Vec<DnsRecord> = parse_envelope(200, body, "list DNS records").unwrap();
    assert_eq!(records[0].record_type, "CNAME");
    assert!(records[0].proxied);
}

// =============================================================================
// Zone/domain helpers
// =============================================================================

#[test]
fn root_domain_takes_last_two_labels() {
    assert_eq!(root_domain("api.example.com").unwrap(), "example.com");
    assert_eq!(root_domain("a.b.c.example.com").unwrap(), "example.com");
    assert_eq!(root_domain("example.com").unwrap(), "example.com");
}

#[test]
fn root_domain_rejects_single_label() {
    assert!(root_domain("localhost").is_none());
    assert!(root_domain("").is_none());
}

#[test]
fn root_domain_is_wrong_for_multi_label_suffixes() {
    // Known limitation of the heuristic: explicit zone config is the fix.
    assert_eq!(root_domain("app.example.co.uk").unwrap(), "co.uk");
}

#[tokio::test]
async fn explicit_zone_id_short_circuits_resolution() {
    let mut cfg = config();
    cfg.zone_id = Some("zone-42".into());
    let client = CloudflareClient::new(&cfg).unwrap();

    // No network involved: the configured id wins before any listing.
    let resolved = client.resolve_zone_for_domain("example.com").await.unwrap();
    assert_eq!(resolved.as_deref(), Some("zone-42"));
}

#[test]
fn tunnel_cname_points_at_routing_suffix() {
    assert_eq!(tunnel_cname("t-1"), "t-1.cfargotunnel.com");
}

// =============================================================================
// Secret generation
// =============================================================================

#[test]
fn generated_secret_is_32_random_bytes_base64() {
    let a = super::client::generate_tunnel_secret();
    let b = super::client::generate_tunnel_secret();

    let decoded = base64::engine::general_purpose::STANDARD.decode(&a).unwrap();
    assert_eq!(decoded.len(), 32);
    assert_ne!(a, b, "secrets must be random per creation");
}
