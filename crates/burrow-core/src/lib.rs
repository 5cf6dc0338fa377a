//! Burrow Core Library
//!
//! Shared functionality for Burrow components:
//! - Desired-service model and route planning
//! - Bounded retry with exponential backoff
//! - Run-directory artifact paths
//! - Atomic filesystem helpers
//! - Common error types

pub mod error;
pub mod fsio;
pub mod paths;
pub mod plan;
pub mod retry;
pub mod tracing_init;

pub use error::{Error, Result};
pub use plan::{DesiredService, Protocol, RoutePlan};
pub use retry::{RetryPolicy, RetryableError};
