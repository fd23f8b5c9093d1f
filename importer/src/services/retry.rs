//! Retry with exponential backoff for transient failures
//!
//! Network timeouts, throttling responses and a busy store are retried until
//! `max_wait` has elapsed. Any other error is returned immediately.

use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::error::ImportResult;

const INITIAL_BACKOFF_MS: u64 = 10;
const MAX_BACKOFF_MS: u64 = 1000;

/// Run `operation` until it succeeds, fails permanently, or `max_wait` runs out
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g. "efetch", "commit 12345")
/// * `max_wait` - Total time budget for retries
/// * `operation` - Closure producing a fresh attempt each call
pub async fn retry_with_backoff<F, Fut, T>(operation_name: &str, max_wait: Duration, mut operation: F) -> ImportResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ImportResult<T>>,
{
    let start = Instant::now();
    let mut attempt = 0u32;
    let mut backoff_ms = INITIAL_BACKOFF_MS;

    loop {
        attempt += 1;
        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying operation");
        }

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if err.is_transient() => {
                let elapsed = start.elapsed();
                if elapsed >= max_wait {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        error = %err,
                        "Giving up after retries"
                    );
                    return Err(err);
                }

                // Up to 25% jitter so parallel chunks do not retry in lockstep
                let jitter = rand::thread_rng().gen_range(0..=backoff_ms / 4);
                let remaining = max_wait.saturating_sub(elapsed);
                let delay = Duration::from_millis(backoff_ms + jitter).min(remaining);

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
            Err(err) => return Err(err),
        }
    }
}
