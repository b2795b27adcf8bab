//! Retry with exponential backoff for remote transfers.
//!
//! Only transient failures ([`StorageError::is_transient`]) are retried.
//! Configuration and authentication errors fail on the first attempt.

use std::future::Future;
use std::time::Duration;

use dbfile_storage_core::StorageError;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
    /// Bound on each single attempt. Expiry counts as a transient failure.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::remote()
    }
}

impl RetryPolicy {
    /// Three attempts with 200ms..2s backoff, one minute per attempt.
    #[must_use]
    pub fn remote() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            factor: 2.0,
            attempt_timeout: Duration::from_secs(60),
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max.max(initial);
        self
    }

    #[must_use]
    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out.
pub async fn retry<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;
        let result = match timeout(policy.attempt_timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(format!(
                "{} did not finish within {:?}",
                operation_name, policy.attempt_timeout
            ))),
        };

        match result {
            Ok(value) => {
                if attempt > 1 {
                    info!(
                        "Operation '{}' succeeded after {} attempts",
                        operation_name, attempt
                    );
                }
                return Ok(value);
            }
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) if attempt >= max_attempts => {
                warn!(
                    "Operation '{}' failed after {} attempts: {}",
                    operation_name, attempt, err
                );
                return Err(err);
            }
            Err(err) => {
                warn!(
                    "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}...",
                    operation_name, attempt, max_attempts, err, delay
                );
                sleep(delay).await;
                delay = delay.mul_f64(policy.factor).min(policy.max_delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy::remote()
            .with_delays(Duration::from_millis(1), Duration::from_millis(5))
            .with_attempt_timeout(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicUsize::new(0);
        let result = retry("op", &fast(), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(StorageError::Transient("503".into()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = retry("op", &fast(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Transient("down".into()))
        })
        .await;
        assert!(matches!(result, Err(StorageError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = retry("op", &fast(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Auth("403".into()))
        })
        .await;
        assert!(matches!(result, Err(StorageError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_timeout_is_transient() {
        let calls = AtomicUsize::new(0);
        let policy = fast()
            .with_max_attempts(2)
            .with_attempt_timeout(Duration::from_millis(20));
        let result: Result<(), _> = retry("op", &policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(StorageError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
