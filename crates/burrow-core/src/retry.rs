//! Bounded retry with exponential backoff.
//!
//! Every remote call in Burrow goes through a [`RetryPolicy`]. The policy
//! only re-runs operations whose error advertises itself as retryable
//! (timeouts, connection resets); structured provider errors fail fast.
//! On exhaustion the last error is propagated unchanged so callers can
//! still tell what actually went wrong.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// Classifies an error as worth retrying or not.
///
/// Implemented by the error types of components that run under a
/// [`RetryPolicy`]. Non-retryable errors short-circuit the retry loop
/// immediately.
pub trait RetryableError {
    /// Whether another attempt could plausibly succeed.
    fn is_retryable(&self) -> bool;
}

/// Exponential backoff retry policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap applied to the computed delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Calculate the backoff delay after a given failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let delay_ms = base_ms * self.multiplier.powi(attempt as i32);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }

    /// Whether another attempt is within budget. `completed` counts
    /// attempts already made.
    pub const fn should_retry(&self, completed: u32) -> bool {
        completed < self.max_attempts
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is exhausted.
    ///
    /// Each retry is announced through a structured `warn!` carrying the
    /// operation label, attempt number and wait time. Callers must only
    /// pass operations where re-execution is safe; creation calls re-check
    /// existence first rather than relying on this loop being exactly-once.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + std::fmt::Display,
    {
        let mut completed: u32 = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    completed += 1;
                    if !e.is_retryable() || !self.should_retry(completed) {
                        return Err(e);
                    }

                    let delay = self.delay_for_attempt(completed - 1);
                    warn!(
                        operation = label,
                        attempt = completed,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
