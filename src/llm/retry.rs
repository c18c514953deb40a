//! Bounded retry with exponential backoff for remote calls.
//!
//! Every remote call carries its own retry budget; the orchestration layer
//! never re-drives an entire run. Callers supply a transiency predicate so
//! deterministic failures (bad arguments, unknown collection) are returned
//! immediately.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Default base delay before the first retry.
const DEFAULT_BASE_DELAY_MS: u64 = 500;
/// Default cap on a single backoff delay.
const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

/// Retry parameters for a remote call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the initial call.
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub base_delay: Duration,
    /// Cap on a single backoff delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy with the given retry count and default delays.
    #[must_use]
    pub const fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }

    /// Backoff delay for a zero-based attempt index.
    ///
    /// Formula: `min(max_delay, base_delay * 2^attempt)`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_retries(3)
    }
}

/// Runs `op` with bounded retries, backing off between attempts.
///
/// `is_transient` decides whether a given error is worth retrying;
/// deterministic errors are returned at once. The final error is returned
/// when the budget is exhausted.
///
/// # Errors
///
/// Returns the last error produced by `op`.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    is_transient: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_retries && is_transient(&e) => {
                let delay = policy.backoff_delay(attempt);
                debug!(
                    target = what,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
