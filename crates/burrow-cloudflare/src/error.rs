//! Cloudflare API client error types.

use burrow_core::RetryableError;
use thiserror::Error;

/// Result type alias for Cloudflare client operations.
pub type Result<T> = std::result::Result<T, CloudflareError>;

/// Errors surfaced by the Cloudflare client.
#[derive(Debug, Error)]
pub enum CloudflareError {
    /// Timeouts, connection resets and friends. Retried by the client's
    /// retry policy up to its budget.
    #[error("network error: {0}")]
    Transient(String),

    /// Structured 4xx/5xx from the API, including the provider-supplied
    /// detail. Never retried at this layer; the caller decides.
    #[error("Cloudflare API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A zone or record that must exist does not.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// A response payload that did not match the expected shape.
    #[error("failed to decode API response: {0}")]
    Decode(String),

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RetryableError for CloudflareError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<reqwest::Error> for CloudflareError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Api {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            // Timeouts, connect failures and mid-flight resets all land
            // here; they are the retryable class.
            Self::Transient(e.to_string())
        }
    }
}
