//! Bounded exponential-backoff retry.
//!
//! Attempt `k` (1-based) that fails with a retryable error is followed by a
//! wait of `min(initial_delay * multiplier^(k-1), max_delay)`. There is no wait
//! after the final attempt. Waits and in-flight attempts race the caller's
//! cancellation token.

use std::future::Future;
use std::time::Duration;

use innerworld_types::config::RetryConfig;
use innerworld_types::error::ResilienceError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Delay to wait after a failed `attempt` (1-based) before the next one.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
    let factor = config.backoff_multiplier.max(1.0).powi(exponent);
    let millis = config.initial_delay_ms as f64 * factor;
    let max = config.max_delay();

    if !millis.is_finite() || millis >= max.as_millis() as f64 {
        return max;
    }
    Duration::from_millis(millis as u64).min(max)
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
///
/// `op` receives the 1-based attempt number. `is_retryable` decides whether
/// an error is worth another attempt; a `false` ends the loop immediately with
/// [`ResilienceError::NonRetryable`].
pub async fn retry_with_backoff<T, E, F, Fut, C>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    is_retryable: C,
    mut op: F,
) -> Result<T, ResilienceError<E>>
where
    E: std::error::Error + 'static,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        if cancel.is_cancelled() {
            return Err(ResilienceError::Cancelled);
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResilienceError::Cancelled),
            outcome = op(attempt) => outcome,
        };

        let error = match outcome {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !is_retryable(&error) {
            debug!(attempt, error = %error, "non-retryable error");
            return Err(ResilienceError::NonRetryable(error));
        }

        if attempt >= max_attempts {
            warn!(attempts = attempt, error = %error, "all retry attempts failed");
            return Err(ResilienceError::Exhausted {
                attempts: attempt,
                source: error,
            });
        }

        let delay = backoff_delay(config, attempt);
        warn!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "attempt failed, retrying"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResilienceError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
