//! Integration tests for provider routing and ordered failover.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use bifrost::{
    BifrostError, BucketConfig, CompletionRequest, CompletionResponse, MemoryStore, Message,
    ProviderAdapter, ProviderRouter, ProviderTier, RateLimiter, Result, RetryPolicy, RouteEntry,
    TierRoutes, ToolSpec,
};

enum Behaviour {
    Succeed,
    FailTransient,
    FailPermanent,
    /// Fail transiently N times, then succeed.
    FailThenSucceed(AtomicU32),
}

/// In-process provider double; `complete` is overridden so no wire
/// format is involved.
struct MockProvider {
    id: String,
    resource: String,
    behaviour: Behaviour,
    calls: AtomicU32,
}

impl MockProvider {
    fn new(id: &str, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_owned(),
            resource: id.to_owned(),
            behaviour,
            calls: AtomicU32::new(0),
        })
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn resource_name(&self) -> &str {
        &self.resource
    }

    fn build_request(&self, _request: &CompletionRequest, model: &str) -> Result<Value> {
        Ok(json!({"model": model}))
    }

    fn parse_response(&self, model: &str, _native: Value) -> Result<CompletionResponse> {
        Ok(CompletionResponse {
            content: format!("{} says hi", self.id),
            provider: self.id.clone(),
            model: model.to_owned(),
            ..Default::default()
        })
    }

    async fn send(&self, _native: Value) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match &self.behaviour {
            Behaviour::Succeed => Ok(json!({})),
            Behaviour::FailTransient => Err(BifrostError::TransientIo("connection reset".into())),
            Behaviour::FailPermanent => Err(BifrostError::AuthenticationFailed),
            Behaviour::FailThenSucceed(remaining) => {
                if remaining.load(Ordering::Relaxed) > 0 {
                    remaining.fetch_sub(1, Ordering::Relaxed);
                    Err(BifrostError::TransientIo("flaky".into()))
                } else {
                    Ok(json!({}))
                }
            }
        }
    }
}

fn routes(entries: &[(&str, &str)]) -> TierRoutes {
    TierRoutes {
        balanced: entries
            .iter()
            .map(|(provider, model)| RouteEntry {
                provider: (*provider).to_owned(),
                model: (*model).to_owned(),
            })
            .collect(),
        ..Default::default()
    }
}

fn open_limiter(resources: &[&str]) -> Arc<RateLimiter> {
    let configs: HashMap<String, BucketConfig> = resources
        .iter()
        .map(|r| {
            (
                (*r).to_owned(),
                BucketConfig {
                    capacity: 100,
                    refill_rate: 100.0,
                },
            )
        })
        .collect();
    Arc::new(RateLimiter::new(Arc::new(MemoryStore::new()), configs))
}

fn no_retry_policy() -> RetryPolicy {
    RetryPolicy::disabled()
}

fn request() -> CompletionRequest {
    CompletionRequest::new(vec![Message::user("How did I sleep?")])
}

#[tokio::test]
async fn fails_over_to_next_provider_on_transient_error() {
    let a = MockProvider::new("a", Behaviour::FailTransient);
    let b = MockProvider::new("b", Behaviour::Succeed);
    let mut router = ProviderRouter::new(
        routes(&[("a", "model-a"), ("b", "model-b")]),
        open_limiter(&["a", "b"]),
        no_retry_policy(),
    );
    router.add_adapter(a.clone());
    router.add_adapter(b.clone());

    let response = router
        .complete(&request(), ProviderTier::Balanced, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.provider, "b");
    assert_eq!(response.model, "model-b");
    assert_eq!(a.call_count(), 1);
    assert_eq!(b.call_count(), 1);
}

#[tokio::test]
async fn exhaustion_reports_failures_in_provider_order() {
    let a = MockProvider::new("a", Behaviour::FailTransient);
    let b = MockProvider::new("b", Behaviour::FailPermanent);
    let mut router = ProviderRouter::new(
        routes(&[("a", "model-a"), ("b", "model-b")]),
        open_limiter(&["a", "b"]),
        no_retry_policy(),
    );
    router.add_adapter(a);
    router.add_adapter(b);

    let err = router
        .complete(&request(), ProviderTier::Balanced, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        BifrostError::ProvidersExhausted(failures) => {
            assert_eq!(failures.len(), 2);
            assert_eq!(failures[0].provider, "a");
            assert_eq!(failures[1].provider, "b");
            assert!(matches!(
                failures[0].error,
                BifrostError::RetriesExhausted { .. } | BifrostError::TransientIo(_)
            ));
            assert!(matches!(
                failures[1].error,
                BifrostError::AuthenticationFailed
            ));
        }
        other => panic!("expected ProvidersExhausted, got {other}"),
    }
}

#[tokio::test]
async fn retry_absorbs_single_transient_error_before_failover() {
    let a = MockProvider::new("a", Behaviour::FailThenSucceed(AtomicU32::new(1)));
    let b = MockProvider::new("b", Behaviour::Succeed);
    let mut router = ProviderRouter::new(
        routes(&[("a", "model-a"), ("b", "model-b")]),
        open_limiter(&["a", "b"]),
        RetryPolicy::new()
            .max_attempts(2)
            .base_delay(Duration::from_millis(1))
            .jitter_fraction(0.0),
    );
    router.add_adapter(a.clone());
    router.add_adapter(b.clone());

    let response = router
        .complete(&request(), ProviderTier::Balanced, &CancellationToken::new())
        .await
        .unwrap();

    // First provider recovered on its retry; second was never consulted.
    assert_eq!(response.provider, "a");
    assert_eq!(a.call_count(), 2);
    assert_eq!(b.call_count(), 0);
}

#[tokio::test]
async fn permanent_error_is_not_retried_on_same_provider() {
    let a = MockProvider::new("a", Behaviour::FailPermanent);
    let b = MockProvider::new("b", Behaviour::Succeed);
    let mut router = ProviderRouter::new(
        routes(&[("a", "model-a"), ("b", "model-b")]),
        open_limiter(&["a", "b"]),
        RetryPolicy::new()
            .max_attempts(3)
            .base_delay(Duration::from_millis(1)),
    );
    router.add_adapter(a.clone());
    router.add_adapter(b.clone());

    let response = router
        .complete(&request(), ProviderTier::Balanced, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.provider, "b");
    assert_eq!(a.call_count(), 1);
}

#[tokio::test]
async fn limiter_denial_triggers_failover_not_wait() {
    let a = MockProvider::new("a", Behaviour::Succeed);
    let b = MockProvider::new("b", Behaviour::Succeed);

    let mut configs = HashMap::new();
    configs.insert(
        "a".to_owned(),
        BucketConfig {
            capacity: 1,
            refill_rate: 0.001,
        },
    );
    configs.insert(
        "b".to_owned(),
        BucketConfig {
            capacity: 100,
            refill_rate: 100.0,
        },
    );
    let limiter = Arc::new(RateLimiter::new(Arc::new(MemoryStore::new()), configs));

    // Drain provider a's quota up front.
    assert!(limiter.try_acquire("a", 1).await.unwrap());

    let mut router = ProviderRouter::new(
        routes(&[("a", "model-a"), ("b", "model-b")]),
        limiter,
        no_retry_policy(),
    );
    router.add_adapter(a.clone());
    router.add_adapter(b.clone());

    let response = router
        .complete(&request(), ProviderTier::Balanced, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.provider, "b");
    // Provider a was never even called — the denial happened pre-flight.
    assert_eq!(a.call_count(), 0);
    assert_eq!(b.call_count(), 1);
}

#[tokio::test]
async fn empty_tier_has_no_provider() {
    let router = ProviderRouter::new(
        TierRoutes::default(),
        open_limiter(&[]),
        no_retry_policy(),
    );
    let err = router
        .complete(&request(), ProviderTier::Fast, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BifrostError::NoProvider));
}

#[tokio::test]
async fn unsupported_tool_schema_rejected_before_any_attempt() {
    let a = MockProvider::new("a", Behaviour::Succeed);
    let mut router = ProviderRouter::new(
        routes(&[("a", "model-a")]),
        open_limiter(&["a"]),
        no_retry_policy(),
    );
    router.add_adapter(a.clone());

    let bad = request().tools(vec![ToolSpec::new("t", "desc", json!(["not", "a", "schema"]))]);
    let err = router
        .complete(&bad, ProviderTier::Balanced, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BifrostError::UnsupportedCapability(_)));
    assert_eq!(a.call_count(), 0);
}

#[tokio::test]
async fn cancellation_stops_the_failover_chain() {
    let a = MockProvider::new("a", Behaviour::FailTransient);
    let b = MockProvider::new("b", Behaviour::Succeed);
    let mut router = ProviderRouter::new(
        routes(&[("a", "model-a"), ("b", "model-b")]),
        open_limiter(&["a", "b"]),
        RetryPolicy::new()
            .max_attempts(5)
            .base_delay(Duration::from_secs(10)),
    );
    router.add_adapter(a);
    router.add_adapter(b.clone());

    let cancel = CancellationToken::new();
    let cancel2 = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel2.cancel();
    });

    let err = router
        .complete(&request(), ProviderTier::Balanced, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, BifrostError::Cancelled));
    assert_eq!(b.call_count(), 0);
}
