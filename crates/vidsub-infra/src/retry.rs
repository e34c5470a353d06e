//! Retry with exponential backoff and jitter for remote store calls.
//!
//! Delay before retry `n` (1-based) is `min(max_delay, base_delay * 2^(n-1))`,
//! then multiplied by a jitter factor drawn from [0.5, 1.0]. A throttling
//! response that names a `Retry-After` raises the delay to at least that value,
//! still capped at `max_delay`.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use vidsub_core::{Config, JitterSource, RandomJitter, VideoError};
use vidsub_storage::StorageError;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not counting the initial attempt).
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Hard cap on any single delay.
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.retry_max_attempts(),
            base_delay: Duration::from_millis(config.retry_base_delay_ms()),
            max_delay: Duration::from_millis(config.retry_max_delay_ms()),
            multiplier: 2.0,
        }
    }

    /// Un-jittered delay before retry `retry` (1-based).
    pub fn backoff_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(63) as i32;
        let factor = self.multiplier.powi(exponent);
        let millis = self.base_delay.as_millis() as f64 * factor;
        let max_millis = self.max_delay.as_millis() as f64;
        if !millis.is_finite() || millis >= max_millis {
            return self.max_delay;
        }
        Duration::from_millis(millis as u64)
    }
}

/// How a failed attempt should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network, timeout, 5xx, throttling.
    Retryable,
    /// Auth, validation, not found, configuration.
    Terminal,
}

pub fn storage_error_class(err: &StorageError) -> ErrorClass {
    if err.is_retryable() {
        ErrorClass::Retryable
    } else {
        ErrorClass::Terminal
    }
}

pub fn video_error_class(err: &VideoError) -> ErrorClass {
    match err {
        VideoError::Throttled { .. } | VideoError::TransientNetwork(_) => ErrorClass::Retryable,
        _ => ErrorClass::Terminal,
    }
}

/// Executes operations under a [`RetryPolicy`].
#[derive(Clone)]
pub struct RetryEngine {
    policy: RetryPolicy,
    jitter: Arc<dyn JitterSource>,
}

impl RetryEngine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_jitter(policy, Arc::new(RandomJitter))
    }

    pub fn with_jitter(policy: RetryPolicy, jitter: Arc<dyn JitterSource>) -> Self {
        Self { policy, jitter }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Delay actually slept before retry `retry`, given the error that caused it.
    pub fn delay_for_retry(&self, retry: u32, err: &VideoError) -> Duration {
        let jittered = self
            .policy
            .backoff_for_retry(retry)
            .mul_f64(self.jitter.factor().clamp(0.5, 1.0));
        match err.retry_after() {
            Some(secs) => jittered
                .max(Duration::from_secs(secs))
                .min(self.policy.max_delay),
            None => jittered,
        }
    }

    /// Run `operation` until it succeeds, fails terminally, or has been
    /// attempted `max_retries + 1` times.
    ///
    /// Exhaustion yields [`VideoError::MaxRetriesExceeded`] wrapping the last error.
    pub async fn execute<T, E, F, Fut, C>(
        &self,
        operation_name: &str,
        classify: C,
        mut operation: F,
    ) -> Result<T, VideoError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<VideoError> + Display,
        C: Fn(&E) -> ErrorClass,
    {
        let total_attempts = self.policy.max_retries.saturating_add(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let err = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            operation = operation_name,
                            attempt,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let class = classify(&err);
            let message = err.to_string();
            let err: VideoError = err.into();

            if class == ErrorClass::Terminal {
                debug!(
                    operation = operation_name,
                    attempt,
                    error = %message,
                    "Terminal error, not retrying"
                );
                return Err(err);
            }

            if attempt >= total_attempts {
                error!(
                    operation = operation_name,
                    attempts = attempt,
                    error = %message,
                    "Retries exhausted"
                );
                return Err(VideoError::MaxRetriesExceeded {
                    operation: operation_name.to_string(),
                    attempts: attempt,
                    last_error: Box::new(err),
                });
            }

            let delay = self.delay_for_retry(attempt, &err);
            warn!(
                operation = operation_name,
                attempt,
                max_attempts = total_attempts,
                classification = "retryable",
                delay_ms = delay.as_millis() as u64,
                error = %message,
                "Retrying after transient error"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use vidsub_core::FixedJitter;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }

    fn engine(max_retries: u32) -> RetryEngine {
        RetryEngine::with_jitter(policy(max_retries), Arc::new(FixedJitter(1.0)))
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = policy(10);
        assert_eq!(p.backoff_for_retry(1), Duration::from_millis(100));
        assert_eq!(p.backoff_for_retry(2), Duration::from_millis(200));
        assert_eq!(p.backoff_for_retry(3), Duration::from_millis(400));
        assert_eq!(p.backoff_for_retry(5), Duration::from_secs(1));
        assert_eq!(p.backoff_for_retry(200), Duration::from_secs(1));
    }

    #[test]
    fn jitter_halves_at_most() {
        let engine = RetryEngine::with_jitter(policy(3), Arc::new(FixedJitter(0.5)));
        let err = VideoError::TransientNetwork("reset".into());
        assert_eq!(engine.delay_for_retry(2, &err), Duration::from_millis(100));
    }

    #[test]
    fn random_jitter_stays_within_bounds() {
        let engine = RetryEngine::new(policy(3));
        let err = VideoError::TransientNetwork("reset".into());
        for _ in 0..64 {
            let delay = engine.delay_for_retry(3, &err);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(400));
        }
    }

    #[test]
    fn retry_after_raises_delay_but_not_past_cap() {
        let engine = engine(3);
        let throttled = VideoError::Throttled {
            message: "slow down".into(),
            retry_after: Some(30),
        };
        assert_eq!(engine.delay_for_retry(1, &throttled), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn always_retryable_runs_max_plus_one_times() {
        let calls = AtomicU32::new(0);
        let result: Result<(), VideoError> = engine(3)
            .execute("get_object_metadata", storage_error_class, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(StorageError::Network("timeout".into())) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result.unwrap_err() {
            VideoError::MaxRetriesExceeded {
                operation,
                attempts,
                last_error,
            } => {
                assert_eq!(operation, "get_object_metadata");
                assert_eq!(attempts, 4);
                assert!(matches!(*last_error, VideoError::TransientNetwork(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_error_short_circuits() {
        let calls = AtomicU32::new(0);
        let result: Result<(), VideoError> = engine(3)
            .execute("delete_object", storage_error_class, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(StorageError::Auth("bad token".into())) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result.unwrap_err(), VideoError::RemoteAuth(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let result = engine(3)
            .execute("create_upload_session", storage_error_class, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(StorageError::Http {
                            status: 503,
                            message: "unavailable".into(),
                        })
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        // 100ms + 200ms of backoff under paused time.
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), VideoError> = engine(5)
            .execute("delete_object", storage_error_class, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(StorageError::NotFound("R1".into())) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_single_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), VideoError> = engine(0)
            .execute("op", video_error_class, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(VideoError::TransientNetwork("x".into())) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result.unwrap_err(),
            VideoError::MaxRetriesExceeded { attempts: 1, .. }
        ));
    }
}
