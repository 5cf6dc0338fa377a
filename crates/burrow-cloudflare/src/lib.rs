//! Cloudflare API integration.
//!
//! Provides a reqwest-based client for the Cloudflare v4 REST API, covering
//! the three resource families Burrow reconciles: named tunnels, tunnel
//! connection tokens, and DNS (zones + records). Every remote call runs
//! under the shared retry policy from burrow-core.

mod client;
pub mod error;
pub mod types;

#[cfg(test)]
mod tests;

pub use client::{CloudflareClient, CloudflareConfig, root_domain};
pub use error::CloudflareError;
pub use types::{DnsRecord, TunnelIdentity, Zone};
