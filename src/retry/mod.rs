//! Bounded retry with exponential backoff and jitter.
//!
//! [`execute`] wraps an arbitrary async operation with the retry loop;
//! [`RetryPolicy`] is plain data, so attempts/backoff/jitter are
//! configuration rather than duplicated control flow at call sites.
//! What counts as retryable is supplied by the caller per call site —
//! the executor never hardcodes error classification
//! ([`BifrostError::is_transient`] is the usual predicate).
//!
//! Operations with non-idempotent side effects must not be wrapped
//! unless the caller guarantees idempotence (e.g. via an idempotency
//! key); the executor cannot enforce that.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::telemetry;
use crate::{BifrostError, Result};

/// Retry behaviour for one call. Immutable per call; not shared state.
///
/// ```rust
/// # use bifrost::RetryPolicy;
/// # use std::time::Duration;
/// let policy = RetryPolicy::new()
///     .max_attempts(5)
///     .base_delay(Duration::from_millis(200))
///     .jitter_fraction(0.2);
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial one).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 500ms.
    pub base_delay: Duration,
    /// Maximum delay between attempts (caps exponential growth). Default: 30s.
    pub max_delay: Duration,
    /// Uniform jitter applied as `± delay × jitter_fraction`. Must be in
    /// [0, 1]. Default: 0.2.
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter_fraction: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a policy that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial one). Clamped to ≥ 1.
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    /// Set the base delay before the first retry.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay between attempts.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter fraction (clamped to [0, 1]).
    pub fn jitter_fraction(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Non-jittered delay after a failed attempt (1-indexed):
    /// `min(max_delay, base_delay × 2^(attempt-1))`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let doubled = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        doubled.min(self.max_delay)
    }

    /// Delay with uniform jitter applied, respecting a provider
    /// `retry_after` hint when one was given (the hint wins outright —
    /// jittering a server-mandated wait would undercut it).
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint;
        }
        let base = self.delay_for_attempt(attempt);
        if self.jitter_fraction == 0.0 {
            return base;
        }
        let spread = base.as_secs_f64() * self.jitter_fraction;
        let jitter = rand::random::<f64>() * spread * 2.0 - spread;
        Duration::from_secs_f64((base.as_secs_f64() + jitter).max(0.0))
    }
}

/// Execute an async operation with bounded, jittered retries.
///
/// Attempt 1 runs immediately. On failure, `is_retryable(&error)` is
/// consulted: if false, or if this was the final allowed attempt, the
/// failure is returned — in the exhausted case wrapped as
/// [`BifrostError::RetriesExhausted`] with the attempt count and the
/// last underlying error. Otherwise the task suspends for the jittered
/// backoff delay and retries. Attempts run strictly sequentially.
///
/// Cancellation is observed during both the operation call and the
/// inter-attempt sleep, returning [`BifrostError::Cancelled`] — never
/// a retry-exhausted outcome.
pub async fn execute<F, Fut, T, P>(
    policy: &RetryPolicy,
    operation: &str,
    cancel: &CancellationToken,
    is_retryable: P,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&BifrostError) -> bool,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BifrostError::Cancelled),
            outcome = f() => outcome,
        };
        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(BifrostError::Cancelled) => return Err(BifrostError::Cancelled),
            Err(e) => e,
        };
        if !is_retryable(&err) {
            return Err(err);
        }
        if attempt >= policy.max_attempts {
            return Err(BifrostError::RetriesExhausted {
                attempts: attempt,
                source: Box::new(err),
            });
        }
        metrics::counter!(telemetry::RETRIES_TOTAL, "operation" => operation.to_owned())
            .increment(1);
        let delay = policy.effective_delay(attempt, err.retry_after());
        warn!(
            operation,
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying after transient error"
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BifrostError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
