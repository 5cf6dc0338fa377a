//! Error types for the Burrow core library.

use thiserror::Error;

/// Result type alias using the Burrow core Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Burrow operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid desired-state input. Fatal, never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
