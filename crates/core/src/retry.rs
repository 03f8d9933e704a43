//! Bounded retry with a fixed delay between attempts.
//!
//! Every outbound call in the pipeline (search, page fetch, LLM completion)
//! goes through a [`RetryExecutor`]. The delay is constant: attempt `n + 1`
//! starts `delay` after attempt `n` failed, no exponential growth.
//!
//! When a [`CancellationToken`] is attached, it is raced against both the
//! running attempt and every inter-attempt sleep.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of invocations, including the first. Values below 1 are
    /// treated as 1.
    pub max_attempts: u32,

    /// Fixed pause after each failed attempt.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Build from configuration values (delay in fractional seconds).
    pub fn from_secs_f64(max_attempts: u32, delay_secs: f64) -> Self {
        Self::new(max_attempts, duration_from_secs(delay_secs))
    }

    /// Search: 3 attempts, 2.0s apart.
    pub fn search() -> Self {
        Self::from_secs_f64(3, 2.0)
    }

    /// Content extraction: 2 attempts, 1.0s apart.
    pub fn extraction() -> Self {
        Self::from_secs_f64(2, 1.0)
    }

    /// Agent-level LLM calls: 3 attempts, 1.0s apart.
    pub fn agent() -> Self {
        Self::from_secs_f64(3, 1.0)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Fractional seconds from configuration as a [`Duration`]. Negative and
/// NaN values become zero; values too large to represent saturate.
pub fn duration_from_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Why a retried operation gave up.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: E },

    #[error("cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    /// Number of attempts that were started.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Cancelled { attempts } => {
                *attempts
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }
}

/// Runs an operation until it succeeds or the policy is used up.
///
/// The wrapped operation may run more than once, so it must be safe to
/// repeat.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    operation: String,
    cancel: Option<CancellationToken>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            operation: "operation".into(),
            cancel: None,
        }
    }

    /// Label used in log lines.
    pub fn named(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Invoke `operation`, retrying on `Err` after the fixed delay.
    ///
    /// Returns the last error once `max_attempts` invocations have failed.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.policy.attempts();
        let mut attempt = 0;

        loop {
            if self.is_cancelled() {
                debug!(operation = %self.operation, attempt, "Cancelled before attempt");
                return Err(RetryError::Cancelled { attempts: attempt });
            }
            attempt += 1;

            let outcome = match &self.cancel {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            debug!(operation = %self.operation, attempt, "Cancelled mid-attempt");
                            return Err(RetryError::Cancelled { attempts: attempt });
                        }
                        outcome = operation() => outcome,
                    }
                }
                None => operation().await,
            };

            let error = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = %self.operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if attempt >= max_attempts {
                warn!(
                    operation = %self.operation,
                    attempts = attempt,
                    error = %error,
                    "Retries exhausted"
                );
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            }

            warn!(
                operation = %self.operation,
                attempt,
                max_attempts,
                delay_ms = self.policy.delay.as_millis() as u64,
                error = %error,
                "Attempt failed, retrying"
            );

            match &self.cancel {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            return Err(RetryError::Cancelled { attempts: attempt });
                        }
                        _ = tokio::time::sleep(self.policy.delay) => {}
                    }
                }
                None => tokio::time::sleep(self.policy.delay).await,
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn counting_failure(
        calls: Arc<AtomicU32>,
        succeed_on: u32,
    ) -> impl FnMut() -> std::future::Ready<Result<&'static str, String>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= succeed_on {
                std::future::ready(Ok("done"))
            } else {
                std::future::ready(Err(format!("failure #{n}")))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_does_not_wait() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();
        let result = RetryExecutor::new(RetryPolicy::search())
            .execute(counting_failure(calls.clone(), 1))
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_fixed_delay_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();
        let result = RetryExecutor::new(RetryPolicy::search())
            .execute(counting_failure(calls.clone(), 3))
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two failures, two fixed 2s pauses. No growth between them.
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_surfaces_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let err = RetryExecutor::new(RetryPolicy::extraction())
            .execute(counting_failure(calls.clone(), u32::MAX))
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        match err {
            RetryError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 2);
                assert_eq!(last, "failure #2");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_runs_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        let err = RetryExecutor::new(policy)
            .execute(counting_failure(calls.clone(), u32::MAX))
            .await
            .unwrap_err();
        assert_eq!(err.attempts(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_is_checked_between_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let token = CancellationToken::new();
        let executor = RetryExecutor::new(RetryPolicy::search()).with_cancellation(token.clone());

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                token.cancel();
            })
        };

        let err = executor
            .execute(counting_failure(calls.clone(), u32::MAX))
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(err.is_cancelled());
        // The first attempt ran; the cancel landed during the 2s pause.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.attempts(), 1);
    }

    #[tokio::test]
    async fn already_cancelled_token_never_invokes() {
        let calls = Arc::new(AtomicU32::new(0));
        let token = CancellationToken::new();
        token.cancel();
        let err = RetryExecutor::new(RetryPolicy::agent())
            .with_cancellation(token)
            .execute(counting_failure(calls.clone(), 1))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.attempts(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn policy_from_config_seconds() {
        let policy = RetryPolicy::from_secs_f64(2, 1.5);
        assert_eq!(policy.delay, Duration::from_millis(1500));
        assert_eq!(RetryPolicy::from_secs_f64(1, -3.0).delay, Duration::ZERO);
        assert_eq!(RetryPolicy::from_secs_f64(1, f64::NAN).delay, Duration::ZERO);
        assert_eq!(RetryPolicy::from_secs_f64(1, f64::INFINITY).delay, Duration::MAX);
        assert_eq!(RetryPolicy::from_secs_f64(1, 1e300).delay, Duration::MAX);
    }
}
