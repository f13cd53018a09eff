use std::future::Future;
use std::time::Duration;

use kandle_types::RetryConfig;
use rand::Rng;
use tracing::warn;

use crate::FcpError;

/// Concrete retry policy configured at construction and shared by the source
/// layers, with per-source retryability predicates.
///
/// Backoff is exponential between the configured floor and cap, with a
/// uniform jitter sampled per attempt. `RateLimited` is excluded from retry
/// unconditionally: per-minute limits must surface to the caller, and
/// seconds-scale re-attempts escalate 429 responses into 418 bans.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    attempts: u32,
    min_backoff: Duration,
    max_backoff: Duration,
    jitter: Duration,
}

impl RetryPolicy {
    /// Build a policy from configuration.
    #[must_use]
    pub const fn new(cfg: &RetryConfig) -> Self {
        Self {
            attempts: cfg.attempts,
            min_backoff: cfg.min_backoff,
            max_backoff: cfg.max_backoff,
            jitter: cfg.jitter,
        }
    }

    /// Override the attempt count (per-request `retry_count`).
    #[must_use]
    pub const fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Backoff before the given retry (1-based), jitter included.
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        let exp_ms = self
            .min_backoff
            .as_millis()
            .saturating_mul(1u128 << shift)
            .min(self.max_backoff.as_millis());
        let base = Duration::from_millis(u64::try_from(exp_ms).unwrap_or(u64::MAX));
        let jitter_ms = self.jitter.as_millis();
        if jitter_ms == 0 {
            return base;
        }
        let sampled = rand::rng().random_range(0..=u64::try_from(jitter_ms).unwrap_or(u64::MAX));
        base + Duration::from_millis(sampled)
    }

    /// Run an operation with retries.
    ///
    /// `op` receives the 0-based attempt number (sources use it to rotate
    /// between primary and backup endpoints). `retryable` decides whether an
    /// error is worth another attempt; `RateLimited` never is, regardless.
    /// The original error propagates unwrapped so callers can match on it.
    ///
    /// # Errors
    /// The last failure, once attempts are exhausted or the error is
    /// non-retryable.
    pub async fn run<T, F, Fut>(
        &self,
        mut op: F,
        retryable: impl Fn(&FcpError) -> bool,
    ) -> Result<T, FcpError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, FcpError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    let rate_limit = matches!(err, FcpError::RateLimited { .. });
                    if rate_limit || attempt >= attempts || !retryable(&err) {
                        return Err(err);
                    }
                    let delay = self.delay(attempt);
                    warn!(
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after error"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(&RetryConfig {
            attempts,
            min_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            jitter: Duration::ZERO,
        })
    }

    #[tokio::test]
    async fn retries_transient_errors_up_to_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy(3)
            .run(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(FcpError::Http { status: 500 }) }
                },
                FcpError::is_retryable,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn never_retries_rate_limit() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy(5)
            .run(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(FcpError::rate_limited(None)) }
                },
                |_| true,
            )
            .await;
        assert!(matches!(result, Err(FcpError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn original_error_type_propagates() {
        let result: Result<(), _> = fast_policy(2)
            .run(
                |_| async {
                    Err(FcpError::Api {
                        code: -1121,
                        message: "Invalid symbol.".into(),
                    })
                },
                FcpError::is_retryable,
            )
            .await;
        match result {
            Err(FcpError::Api { code, .. }) => assert_eq!(code, -1121),
            other => panic!("wrapper leaked: {other:?}"),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .run(
                |attempt| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt == 0 {
                            Err(FcpError::network("connection reset"))
                        } else {
                            Ok(attempt)
                        }
                    }
                },
                FcpError::is_retryable,
            )
            .await
            .unwrap();
        assert_eq!(result, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn delay_respects_cap() {
        let policy = RetryPolicy::new(&RetryConfig {
            attempts: 10,
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(120),
            jitter: Duration::ZERO,
        });
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(8), Duration::from_secs(120));
        assert_eq!(policy.delay(30), Duration::from_secs(120));
    }
}
