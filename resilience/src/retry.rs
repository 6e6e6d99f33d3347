//! Bounded retry with exponential backoff and deterministic jitter.
//!
//! The loop never retries a fatal error, honors server-provided
//! `Retry-After` hints for rate limits, and aborts between attempts when the
//! shared cancellation token fires.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How a failed attempt should be treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Retry; the server asked us to slow down. `retry_after` overrides the
    /// computed backoff delay when present.
    RateLimited { retry_after_secs: Option<u64> },
    /// Retry after the normal backoff delay (timeouts, 5xx, network resets).
    Transient,
    /// Do not retry; the error is permanent for this call (auth, 404, bad
    /// request, undecodable payload).
    Fatal,
}

/// Implemented by error types that flow through [`retry`].
pub trait Classify {
    fn classify(&self) -> RetryClass;
}

/// Attempt cap and delay shape for one family of calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles per attempt afterwards.
    pub base_delay: Duration,
    /// Upper bound for any single computed delay.
    pub max_delay: Duration,
    /// Fraction of the delay that jitter may add, in `[0.0, 1.0]`.
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            jitter_ratio: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Policy tuned for free-tier LLM quotas: fewer attempts, longer waits.
    pub fn slow() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(120),
            jitter_ratio: 0.25,
        }
    }

    /// Backoff delay for the attempt that just failed (1-based).
    ///
    /// Jitter is derived from a hash of `(label, attempt)` so a given call
    /// site produces a stable, spread-out schedule without a RNG dependency.
    pub fn delay_for(&self, attempt: u32, label: &str) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let base = self
            .base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay);
        let jitter_span = base.mul_f64(self.jitter_ratio.clamp(0.0, 1.0));
        let mut hasher = Sha256::new();
        hasher.update(label.as_bytes());
        hasher.update(attempt.to_le_bytes());
        let digest = hasher.finalize();
        let bucket = u64::from_le_bytes(digest[..8].try_into().expect("8 bytes")) % 1000;
        base + jitter_span.mul_f64(bucket as f64 / 1000.0)
    }
}

/// Terminal outcome of a [`retry`] loop that never produced an `Ok`.
#[derive(Debug, Error)]
pub enum RetryError<E: Display + std::fmt::Debug> {
    /// The first fatal error encountered; no further attempts were made.
    #[error("permanent failure: {0}")]
    Permanent(E),

    /// All attempts were used up on retryable errors.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted { last: E, attempts: u32 },

    /// The shared cancellation token fired while waiting to retry.
    #[error("cancelled while retrying")]
    Cancelled,
}

impl<E: Display + std::fmt::Debug> RetryError<E> {
    /// The underlying error, when one exists (not for cancellation).
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Permanent(e) | Self::Exhausted { last: e, .. } => Some(e),
            Self::Cancelled => None,
        }
    }
}

/// Runs `op` until it succeeds, hits a fatal error, exhausts the policy, or
/// the token is cancelled.
///
/// `label` names the call site in logs and seeds the jitter.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    label: &str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: Classify + Display + std::fmt::Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }
        attempt += 1;
        match op().await {
            Ok(v) => {
                if attempt > 1 {
                    debug!("{label}: succeeded on attempt {attempt}");
                }
                return Ok(v);
            }
            Err(e) => {
                let class = e.classify();
                if class == RetryClass::Fatal {
                    return Err(RetryError::Permanent(e));
                }
                if attempt >= policy.max_attempts {
                    return Err(RetryError::Exhausted { last: e, attempts: attempt });
                }
                let delay = match class {
                    RetryClass::RateLimited {
                        retry_after_secs: Some(secs),
                    } => Duration::from_secs(secs).min(policy.max_delay),
                    _ => policy.delay_for(attempt, label),
                };
                warn!(
                    "{label}: attempt {attempt}/{} failed ({e}), retrying in {:?}",
                    policy.max_attempts, delay
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError(RetryClass);

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error")
        }
    }

    impl Classify for TestError {
        fn classify(&self) -> RetryClass {
            self.0
        }
    }

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            jitter_ratio: 0.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;
        let out: Result<u32, _> = retry(
            &quick_policy(),
            &CancellationToken::new(),
            "test",
            || async move {
                let n = calls_ref.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(TestError(RetryClass::Transient))
                } else {
                    Ok(7)
                }
            },
        )
        .await;
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_do_not_retry() {
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;
        let out: Result<u32, _> = retry(
            &quick_policy(),
            &CancellationToken::new(),
            "test",
            || async move {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(TestError(RetryClass::Fatal))
            },
        )
        .await;
        assert!(matches!(out, Err(RetryError::Permanent(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_reports_attempt_count() {
        let out: Result<u32, _> = retry(
            &quick_policy(),
            &CancellationToken::new(),
            "test",
            || async { Err::<u32, _>(TestError(RetryClass::Transient)) },
        )
        .await;
        match out {
            Err(RetryError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_token_stops_the_loop() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out: Result<u32, _> =
            retry(&quick_policy(), &cancel, "test", || async { Ok::<u32, TestError>(1u32) }).await;
        assert!(matches!(out, Err(RetryError::Cancelled)));
    }

    #[test]
    fn delay_grows_and_stays_bounded() {
        let p = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            jitter_ratio: 0.0,
        };
        assert_eq!(p.delay_for(1, "x"), Duration::from_millis(100));
        assert_eq!(p.delay_for(2, "x"), Duration::from_millis(200));
        assert_eq!(p.delay_for(5, "x"), Duration::from_secs(1));
        assert_eq!(p.delay_for(9, "x"), Duration::from_secs(1));
    }

    #[test]
    fn jitter_is_deterministic_per_label_and_attempt() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(2, "a"), p.delay_for(2, "a"));
        let base = RetryPolicy {
            jitter_ratio: 0.0,
            ..RetryPolicy::default()
        };
        assert!(p.delay_for(2, "a") >= base.delay_for(2, "a"));
    }
}
