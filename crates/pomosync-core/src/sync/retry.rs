//! Retry with exponential backoff for idempotent remote reads.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u8,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt + 1`.
    pub fn delay(&self, attempt: u8) -> Duration {
        let ms = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(u32::from(attempt)));
        Duration::from_millis(ms)
    }
}

/// Run `op` until it succeeds, `should_retry` rejects the error, or the
/// attempt budget is spent. The last error is returned unchanged.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: RetryPolicy,
    should_retry: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u8 = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if should_retry(&error) && attempt + 1 < max_attempts => {
                let delay = policy.delay(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after failure");
                sleep(delay).await;
                attempt = attempt.saturating_add(1);
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            base_delay_ms: 1,
        }
    }

    #[test]
    fn delay_grows_exponentially() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_millis(1000));
        assert_eq!(policy.delay(1), Duration::from_millis(2000));
        assert_eq!(policy.delay(3), Duration::from_millis(8000));
    }

    #[tokio::test]
    async fn retries_server_error_once_then_succeeds() {
        let calls = AtomicUsize::new(0);
        let result = retry_with_backoff(fast(), ApiError::is_retryable, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ApiError::from_status(503, "busy"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = retry_with_backoff(fast(), ApiError::is_retryable, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ApiError::Network("reset".into())) }
        })
        .await;

        assert_eq!(result, Err(ApiError::Network("reset".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = retry_with_backoff(fast(), ApiError::is_retryable, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ApiError::Unauthorized) }
        })
        .await;

        assert_eq!(result, Err(ApiError::Unauthorized));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy {
            max_attempts: 0,
            base_delay_ms: 1,
        };
        let _: Result<(), ApiError> = retry_with_backoff(policy, |_| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ApiError::Network("down".into())) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
