//! Token-bucket rate limiter over the shared backing store.
//!
//! One bucket per named resource (a logical external quota, e.g. one
//! per third-party API per account). Bucket state lives in the shared
//! store, so every worker process draws from the same quota; admission
//! is a compare-and-swap loop, never a read-then-write pair, so two
//! callers can never both observe sufficient tokens and over-grant.
//!
//! Refill is lazy: each admission attempt first advances the bucket by
//! `elapsed × refill_rate`, capped at capacity, then tries to decrement.
//!
//! # Failure mode
//!
//! If the store is unreachable the limiter fails closed with
//! [`BifrostError::LimiterUnavailable`] — silently exceeding a remote
//! API's quota is worse than denying a best-effort caller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::store::StoreBackend;
use crate::telemetry;
use crate::{BifrostError, Result};

/// Static per-resource bucket configuration, loaded at startup.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BucketConfig {
    /// Maximum tokens the bucket can hold.
    pub capacity: u32,
    /// Tokens added per second.
    pub refill_rate: f64,
}

/// Serialized bucket state as stored in the shared store.
///
/// `tokens` is fractional because refill accrues continuously.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BucketState {
    tokens: f64,
    last_refill_ms: u64,
}

impl BucketState {
    fn full(config: &BucketConfig, now_ms: u64) -> Self {
        Self {
            tokens: config.capacity as f64,
            last_refill_ms: now_ms,
        }
    }

    /// Advance the bucket to `now_ms`, crediting elapsed refill.
    fn refill(&mut self, config: &BucketConfig, now_ms: u64) {
        let elapsed_secs = now_ms.saturating_sub(self.last_refill_ms) as f64 / 1000.0;
        self.tokens = (self.tokens + elapsed_secs * config.refill_rate).min(config.capacity as f64);
        self.last_refill_ms = now_ms;
    }
}

/// Token-bucket admission control per named resource.
pub struct RateLimiter {
    store: Arc<dyn StoreBackend>,
    resources: HashMap<String, BucketConfig>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn StoreBackend>, resources: HashMap<String, BucketConfig>) -> Self {
        Self { store, resources }
    }

    fn config(&self, resource: &str) -> Result<&BucketConfig> {
        let config = self.resources.get(resource).ok_or_else(|| {
            BifrostError::Configuration(format!("no rate limit configured for '{resource}'"))
        })?;
        // A zero or non-finite refill rate would make the wait-time
        // division meaningless (and a zero capacity can never grant), so
        // a degenerate bucket is an error on every operation, not a
        // panic in the one place that divides.
        if config.capacity == 0 || !config.refill_rate.is_finite() || config.refill_rate <= 0.0 {
            return Err(BifrostError::Configuration(format!(
                "invalid bucket for '{resource}': capacity must be at least 1 and refill_rate a positive number"
            )));
        }
        Ok(config)
    }

    /// Try to take `tokens` from the bucket without waiting.
    ///
    /// Returns `Ok(false)` when the bucket has too few tokens. Store
    /// connectivity failures map to
    /// [`BifrostError::LimiterUnavailable`] (fails closed).
    pub async fn try_acquire(&self, resource: &str, tokens: u32) -> Result<bool> {
        let config = *self.config(resource)?;
        let key = bucket_key(resource);

        // CAS loop: losing a swap means another acquirer changed the
        // bucket between our read and write; re-read and try again.
        loop {
            let observed = self
                .store
                .get(&key)
                .await
                .map_err(limiter_unavailable)?;
            let now_ms = unix_now_ms();
            let mut state = match &observed {
                Some(bytes) => decode_state(bytes, &config, now_ms),
                None => BucketState::full(&config, now_ms),
            };
            state.refill(&config, now_ms);

            if state.tokens < tokens as f64 {
                metrics::counter!(telemetry::LIMITER_DENIALS_TOTAL, "resource" => resource.to_owned())
                    .increment(1);
                debug!(resource, tokens, available = state.tokens, "rate limit denied");
                return Ok(false);
            }

            state.tokens -= tokens as f64;
            let payload = serde_json::to_vec(&state)?;
            let swapped = self
                .store
                .compare_and_swap(&key, observed.as_deref(), payload, None)
                .await
                .map_err(limiter_unavailable)?;
            if swapped {
                metrics::counter!(telemetry::LIMITER_GRANTS_TOTAL, "resource" => resource.to_owned())
                    .increment(1);
                return Ok(true);
            }
        }
    }

    /// Take `tokens`, suspending the calling task until they are
    /// available or `max_wait` elapses.
    ///
    /// Returns `Ok(false)` when `max_wait` ran out. Cancellation during
    /// the wait returns [`BifrostError::Cancelled`] without having
    /// decremented the bucket (the decrement only ever happens inside a
    /// successful [`try_acquire`](Self::try_acquire)).
    pub async fn acquire(
        &self,
        resource: &str,
        tokens: u32,
        max_wait: Duration,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + max_wait;
        loop {
            if self.try_acquire(resource, tokens).await? {
                return Ok(true);
            }
            let wait = self.wait_time(resource, tokens).await?;
            let now = tokio::time::Instant::now();
            if now + wait > deadline {
                debug!(resource, tokens, "rate limit wait exceeds max_wait");
                return Ok(false);
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(BifrostError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Whole tokens currently available, after lazy refill. Read-only.
    pub async fn remaining(&self, resource: &str) -> Result<u32> {
        let config = *self.config(resource)?;
        let state = self.peek(resource, &config).await?;
        Ok(state.tokens as u32)
    }

    /// How long until `tokens` would be available, assuming no other
    /// acquirers. Zero if they are available now.
    pub async fn wait_time(&self, resource: &str, tokens: u32) -> Result<Duration> {
        let config = *self.config(resource)?;
        if tokens > config.capacity {
            return Err(BifrostError::InvalidInput(format!(
                "requested {tokens} tokens exceeds capacity {} of '{resource}'",
                config.capacity
            )));
        }
        let state = self.peek(resource, &config).await?;
        let shortfall = tokens as f64 - state.tokens;
        if shortfall <= 0.0 {
            return Ok(Duration::ZERO);
        }
        Ok(Duration::from_secs_f64(shortfall / config.refill_rate))
    }

    async fn peek(&self, resource: &str, config: &BucketConfig) -> Result<BucketState> {
        let observed = self
            .store
            .get(&bucket_key(resource))
            .await
            .map_err(limiter_unavailable)?;
        let now_ms = unix_now_ms();
        let mut state = match &observed {
            Some(bytes) => decode_state(bytes, config, now_ms),
            None => BucketState::full(config, now_ms),
        };
        state.refill(config, now_ms);
        Ok(state)
    }
}

fn bucket_key(resource: &str) -> String {
    format!("ratelimit:{resource}")
}

fn limiter_unavailable(err: BifrostError) -> BifrostError {
    match err {
        BifrostError::StoreUnavailable(msg) => BifrostError::LimiterUnavailable(msg),
        other => other,
    }
}

/// Wall-clock milliseconds; bucket timestamps must be meaningful across
/// processes, so monotonic process-local clocks are not an option.
fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

fn decode_state(bytes: &[u8], config: &BucketConfig, now_ms: u64) -> BucketState {
    serde_json::from_slice(bytes).unwrap_or_else(|e| {
        // A corrupt bucket record should not wedge the resource forever;
        // reset to full and let refill math take over.
        warn!(error = %e, "resetting undecodable bucket state");
        BucketState::full(config, now_ms)
    })
}
