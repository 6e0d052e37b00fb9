// src/error_recovery.rs
//! Retry with exponential backoff for API operations.

use crate::constants::{RETRY_INITIAL_DELAY, RETRY_MAX_ATTEMPTS, RETRY_MAX_DELAY};
use crate::error::AppError;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How often and how patiently a transient failure is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: RETRY_MAX_ATTEMPTS,
            initial_delay: RETRY_INITIAL_DELAY,
            max_delay: RETRY_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A policy with no waiting, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

/// Retries an async operation with exponential backoff.
///
/// Only errors for which [`AppError::is_retryable`] holds are retried; anything
/// else (a 404, a 401, an open breaker) is returned on the spot. Waiting
/// between attempts aborts with [`AppError::Cancelled`] when `cancel` fires.
pub async fn retry_with_backoff<F, T, Fut>(
    mut operation: F,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, AppError>>,
{
    let mut delay = policy.initial_delay;
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts.max(1) {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                if attempt < policy.max_attempts {
                    let wait = with_jitter(delay);
                    log::warn!(
                        "Attempt {}/{} failed ({}), retrying after {:?}",
                        attempt,
                        policy.max_attempts,
                        e,
                        wait
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(AppError::Cancelled),
                        _ = tokio::time::sleep(wait) => {}
                    }

                    // Exponential backoff with cap
                    delay = std::cmp::min(delay * 2, policy.max_delay);
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| AppError::InternalError {
        message: "Retry failed with no error".to_string(),
        source: None,
    }))
}

/// Adds up to 10% random jitter so concurrent workers do not retry in lockstep.
fn with_jitter(delay: Duration) -> Duration {
    let max_jitter = delay.as_millis() as u64 / 10;
    if max_jitter == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::rng().random_range(0..=max_jitter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiErrorCode;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn server_error() -> AppError {
        AppError::ApiService {
            code: ApiErrorCode::ServerError(503),
            message: "unavailable".to_string(),
            url: "/x".to_string(),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failures_until_success() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();

        let result = retry_with_backoff(
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(server_error())
                } else {
                    Ok(7)
                }
            },
            RetryPolicy::immediate(3),
            &token,
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();

        let result: Result<(), _> = retry_with_backoff(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(server_error())
            },
            RetryPolicy::immediate(3),
            &token,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();

        let result: Result<(), _> = retry_with_backoff(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::ApiService {
                    code: ApiErrorCode::Forbidden,
                    message: "no".to_string(),
                    url: "/x".to_string(),
                })
            },
            RetryPolicy::immediate(3),
            &token,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let token = CancellationToken::new();
        token.cancel();

        let result: Result<(), _> =
            retry_with_backoff(|| async { Ok(()) }, RetryPolicy::immediate(3), &token).await;

        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        let base = Duration::from_millis(1000);
        for _ in 0..50 {
            let d = with_jitter(base);
            assert!(d >= base && d <= Duration::from_millis(1100));
        }
        assert_eq!(with_jitter(Duration::ZERO), Duration::ZERO);
    }
}
