//! Bounded retry with exponential backoff.
//!
//! Both retry levels in the pipeline — per-image and per-stage — share the
//! same schedule: sleep `2^attempt` seconds after the failing attempt
//! numbered `attempt` (0-based). The loop is explicit and bounded; nothing
//! recurses.

use std::future::Future;
use std::time::Duration;

/// Backoff delay after the 0-based `attempt`: `2^attempt` seconds.
#[must_use]
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

/// Run `op` up to `1 + max_retries` times, sleeping between attempts.
///
/// An error for which `retryable` returns `false` is returned immediately;
/// so is the error of the final attempt.
///
/// # Errors
///
/// Returns the last error produced by `op`.
pub async fn with_backoff<T, E, F, Fut>(
    max_retries: u32,
    retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_retries && retryable(&err) => {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    attempt,
                    delay_secs = delay.as_secs(),
                    error = %err,
                    "operation failed, backing off",
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
