use crate::config::RetryPolicy;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Calculate the delay before retrying after a failed attempt.
///
/// Exponential backoff: `retry_delay_ms * backoff_factor^attempt` for the
/// zero-based attempt that just failed, plus up to 1000ms of jitter, capped
/// at `max_delay_ms`.
pub fn next_retry_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let backoff = policy.backoff_factor.max(1.0).powi(attempt as i32);
    let delay = (policy.retry_delay_ms as f64 * backoff) as u64;
    let jitter = rand::random::<u64>() % 1000;
    let total = delay.saturating_add(jitter);
    Duration::from_millis(total.min(policy.max_delay_ms))
}

/// Execute an async operation with retries.
///
/// Invokes `operation` at most `policy.max_retries` times in total. Errors
/// for which `is_retryable` returns false abort immediately.
pub async fn retry_async<T, E, F, Fut, P>(
    operation_name: &str,
    policy: &RetryPolicy,
    is_retryable: P,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_retries.max(1);
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !is_retryable(&e) {
                    return Err(e);
                }
                attempt += 1;
                if attempt >= max_attempts {
                    error!(
                        "Failed to execute '{}' after {} attempts: {}",
                        operation_name, max_attempts, e
                    );
                    return Err(e);
                }
                let delay = next_retry_delay(policy, attempt - 1);
                warn!(
                    "Operation '{}' failed. Retrying in {:?} (Attempt {}/{}): {}",
                    operation_name, delay, attempt, max_attempts, e
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
