//! Integration tests for the shared token-bucket rate limiter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use bifrost::{BifrostError, BucketConfig, MemoryStore, RateLimiter, StoreBackend};

fn limiter_with(resource: &str, capacity: u32, refill_rate: f64) -> RateLimiter {
    let mut resources = HashMap::new();
    resources.insert(
        resource.to_owned(),
        BucketConfig {
            capacity,
            refill_rate,
        },
    );
    RateLimiter::new(Arc::new(MemoryStore::new()), resources)
}

#[tokio::test]
async fn grants_up_to_capacity_then_denies() {
    let limiter = limiter_with("garmin_api", 5, 1.0);

    for _ in 0..5 {
        assert!(limiter.try_acquire("garmin_api", 1).await.unwrap());
    }
    assert!(!limiter.try_acquire("garmin_api", 1).await.unwrap());
}

#[tokio::test]
async fn refill_restores_exactly_elapsed_tokens() {
    let limiter = limiter_with("garmin_api", 5, 1.0);

    for _ in 0..5 {
        assert!(limiter.try_acquire("garmin_api", 1).await.unwrap());
    }
    assert!(!limiter.try_acquire("garmin_api", 1).await.unwrap());

    // One second at 1 token/s buys exactly one more grant.
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert!(limiter.try_acquire("garmin_api", 1).await.unwrap());
    assert!(!limiter.try_acquire("garmin_api", 1).await.unwrap());
}

#[tokio::test]
async fn multi_token_requests_draw_proportionally() {
    let limiter = limiter_with("r", 10, 100.0);

    assert!(limiter.try_acquire("r", 6).await.unwrap());
    assert!(!limiter.try_acquire("r", 6).await.unwrap());
    assert!(limiter.try_acquire("r", 4).await.unwrap());
}

#[tokio::test]
async fn remaining_reflects_grants() {
    let limiter = limiter_with("r", 10, 0.001);

    assert_eq!(limiter.remaining("r").await.unwrap(), 10);
    assert!(limiter.try_acquire("r", 3).await.unwrap());
    assert_eq!(limiter.remaining("r").await.unwrap(), 7);
}

#[tokio::test]
async fn wait_time_is_zero_when_tokens_available() {
    let limiter = limiter_with("r", 5, 1.0);
    assert_eq!(
        limiter.wait_time("r", 3).await.unwrap(),
        Duration::ZERO
    );
}

#[tokio::test]
async fn wait_time_scales_with_shortfall() {
    let limiter = limiter_with("r", 4, 2.0);
    for _ in 0..4 {
        assert!(limiter.try_acquire("r", 1).await.unwrap());
    }
    // 3 tokens short at 2 tokens/s ≈ 1.5s.
    let wait = limiter.wait_time("r", 3).await.unwrap();
    assert!(wait > Duration::from_millis(1_200) && wait < Duration::from_millis(1_800));
}

#[tokio::test]
async fn acquire_waits_for_refill() {
    let limiter = limiter_with("r", 2, 50.0);
    let cancel = CancellationToken::new();

    assert!(limiter.try_acquire("r", 2).await.unwrap());
    // 50 tokens/s: one token lands in ~20ms, well inside max_wait.
    let granted = limiter
        .acquire("r", 1, Duration::from_secs(2), &cancel)
        .await
        .unwrap();
    assert!(granted);
}

#[tokio::test]
async fn acquire_gives_up_after_max_wait() {
    let limiter = limiter_with("r", 1, 0.1);
    let cancel = CancellationToken::new();

    assert!(limiter.try_acquire("r", 1).await.unwrap());
    // Next token is ~10s away; a 50ms budget cannot cover it.
    let granted = limiter
        .acquire("r", 1, Duration::from_millis(50), &cancel)
        .await
        .unwrap();
    assert!(!granted);
}

#[tokio::test]
async fn cancelled_acquire_does_not_decrement() {
    let limiter = Arc::new(limiter_with("r", 3, 0.5));
    let cancel = CancellationToken::new();

    for _ in 0..3 {
        assert!(limiter.try_acquire("r", 1).await.unwrap());
    }

    let cancel2 = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel2.cancel();
    });
    let result = limiter
        .acquire("r", 1, Duration::from_secs(30), &cancel)
        .await;
    assert!(matches!(result, Err(BifrostError::Cancelled)));

    // The aborted wait consumed nothing: once refill produces a token,
    // a plain try_acquire gets it.
    tokio::time::sleep(Duration::from_millis(2_100)).await;
    assert!(limiter.try_acquire("r", 1).await.unwrap());
}

#[tokio::test]
async fn unknown_resource_is_a_configuration_error() {
    let limiter = limiter_with("known", 1, 1.0);
    let err = limiter.try_acquire("unknown", 1).await.unwrap_err();
    assert!(matches!(err, BifrostError::Configuration(_)));
}

#[tokio::test]
async fn zero_refill_rate_is_rejected_not_a_panic() {
    // An empty bucket that never refills must surface as a configuration
    // error on every operation; dividing by the refill rate would
    // otherwise blow up in wait_time once the bucket runs dry.
    let limiter = limiter_with("r", 1, 0.0);
    let cancel = CancellationToken::new();

    let err = limiter.try_acquire("r", 1).await.unwrap_err();
    assert!(matches!(err, BifrostError::Configuration(_)));
    let err = limiter.wait_time("r", 1).await.unwrap_err();
    assert!(matches!(err, BifrostError::Configuration(_)));
    let err = limiter
        .acquire("r", 1, Duration::from_millis(50), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, BifrostError::Configuration(_)));
}

#[tokio::test]
async fn negative_refill_rate_is_rejected() {
    let limiter = limiter_with("r", 5, -1.0);
    let err = limiter.try_acquire("r", 1).await.unwrap_err();
    assert!(matches!(err, BifrostError::Configuration(_)));
}

#[tokio::test]
async fn oversized_request_is_invalid() {
    let limiter = limiter_with("r", 5, 1.0);
    let err = limiter.wait_time("r", 6).await.unwrap_err();
    assert!(matches!(err, BifrostError::InvalidInput(_)));
}

// ============================================================================
// Fails-closed behaviour when the store is unreachable
// ============================================================================

/// Store stub whose every operation fails like a broken connection.
struct UnreachableStore;

#[async_trait]
impl StoreBackend for UnreachableStore {
    async fn get(&self, _key: &str) -> bifrost::Result<Option<Vec<u8>>> {
        Err(BifrostError::StoreUnavailable("connection refused".into()))
    }

    async fn put(
        &self,
        _key: &str,
        _payload: Vec<u8>,
        _ttl: Option<Duration>,
    ) -> bifrost::Result<()> {
        Err(BifrostError::StoreUnavailable("connection refused".into()))
    }

    async fn compare_and_swap(
        &self,
        _key: &str,
        _expected: Option<&[u8]>,
        _payload: Vec<u8>,
        _ttl: Option<Duration>,
    ) -> bifrost::Result<bool> {
        Err(BifrostError::StoreUnavailable("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> bifrost::Result<()> {
        Err(BifrostError::StoreUnavailable("connection refused".into()))
    }

    async fn delete_prefix(&self, _prefix: &str) -> bifrost::Result<u64> {
        Err(BifrostError::StoreUnavailable("connection refused".into()))
    }

    async fn ping(&self) -> bifrost::Result<()> {
        Err(BifrostError::StoreUnavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn fails_closed_when_store_unreachable() {
    let mut resources = HashMap::new();
    resources.insert(
        "r".to_owned(),
        BucketConfig {
            capacity: 5,
            refill_rate: 1.0,
        },
    );
    let limiter = RateLimiter::new(Arc::new(UnreachableStore), resources);

    let err = limiter.try_acquire("r", 1).await.unwrap_err();
    assert!(matches!(err, BifrostError::LimiterUnavailable(_)));
}
