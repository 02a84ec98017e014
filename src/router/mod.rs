//! Provider routing with ordered failover.
//!
//! The router resolves a [`ProviderTier`] to its configured ordered
//! `(provider, model)` list and attempts each entry strictly in that
//! order, never in parallel — parallel speculative execution would
//! double-bill quota-limited providers. Before each attempt it takes a
//! rate-limiter token for the provider's resource; a denial counts as a
//! transient failure for that provider and triggers failover, not a
//! retry against the same one. Each attempt is wrapped in the retry
//! executor to absorb single transient errors before failing over.
//!
//! # Per-request state machine
//!
//! ```text
//! Start → AttemptProvider(i) → Success
//!                            → TransientFailure → AttemptProvider(i+1)
//!                            → PermanentFailure → AttemptProvider(i+1)  (recorded)
//! all exhausted → Failed(ProvidersExhausted)
//! ```

mod adapter;
mod anthropic;
mod openai;

pub use adapter::ProviderAdapter;
pub use anthropic::AnthropicAdapter;
pub use openai::OpenAiAdapter;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use crate::config::TierRoutes;
use crate::limiter::RateLimiter;
use crate::retry::{self, RetryPolicy};
use crate::telemetry;
use crate::types::{CompletionRequest, CompletionResponse, ProviderTier};
use crate::{BifrostError, Result};

/// One provider's failure within a routing attempt, kept in order so
/// callers can distinguish "all providers down" from "single bad
/// request" when the whole tier is exhausted.
#[derive(Debug)]
pub struct ProviderFailure {
    pub provider: String,
    pub model: String,
    pub error: BifrostError,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}: {}", self.provider, self.model, self.error)
    }
}

/// Routes completion requests to interchangeable AI-inference providers.
pub struct ProviderRouter {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    routes: TierRoutes,
    limiter: Arc<RateLimiter>,
    retry_policy: RetryPolicy,
}

impl ProviderRouter {
    pub fn new(routes: TierRoutes, limiter: Arc<RateLimiter>, retry_policy: RetryPolicy) -> Self {
        Self {
            adapters: HashMap::new(),
            routes,
            limiter,
            retry_policy,
        }
    }

    /// Register an adapter under its provider id.
    pub fn add_adapter(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.id().to_owned(), adapter);
    }

    /// Complete a request against the tier's providers, failing over in
    /// configured order.
    ///
    /// Returns the first successful response. Cancellation propagates
    /// immediately as [`BifrostError::Cancelled`]; every other failure
    /// is recorded and the next provider attempted. When the whole
    /// route fails the error is
    /// [`BifrostError::ProvidersExhausted`] carrying the ordered
    /// per-provider failure history.
    #[instrument(skip(self, request, cancel), fields(tier = %tier))]
    pub async fn complete(
        &self,
        request: &CompletionRequest,
        tier: ProviderTier,
        cancel: &CancellationToken,
    ) -> Result<CompletionResponse> {
        // Reject unsupported constructs before spending quota anywhere.
        for tool in &request.tools {
            tool.validate()?;
        }

        let route = self.routes.route(tier);
        if route.is_empty() {
            return Err(BifrostError::NoProvider);
        }

        let mut failures = Vec::new();
        for entry in route {
            match self.attempt(entry, request, cancel).await {
                Ok(response) => return Ok(response),
                Err(BifrostError::Cancelled) => return Err(BifrostError::Cancelled),
                Err(error) => {
                    warn!(
                        provider = entry.provider,
                        model = entry.model,
                        error = %error,
                        "provider attempt failed, moving to next in tier"
                    );
                    metrics::counter!(telemetry::FAILOVERS_TOTAL, "provider" => entry.provider.clone())
                        .increment(1);
                    failures.push(ProviderFailure {
                        provider: entry.provider.clone(),
                        model: entry.model.clone(),
                        error,
                    });
                }
            }
        }
        Err(BifrostError::ProvidersExhausted(failures))
    }

    async fn attempt(
        &self,
        entry: &crate::config::RouteEntry,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<CompletionResponse> {
        let adapter = self.adapters.get(&entry.provider).ok_or_else(|| {
            BifrostError::Configuration(format!("no adapter registered for '{}'", entry.provider))
        })?;

        // One token per attempt against this provider's quota. A denial
        // fails over rather than waiting: the next provider may have
        // headroom right now.
        if !self.limiter.try_acquire(adapter.resource_name(), 1).await? {
            return Err(BifrostError::Denied {
                resource: adapter.resource_name().to_owned(),
            });
        }

        let start = Instant::now();
        let result = retry::execute(
            &self.retry_policy,
            "complete",
            cancel,
            BifrostError::is_transient,
            || adapter.complete(request, &entry.model),
        )
        .await;

        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "provider" => entry.provider.clone(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "provider" => entry.provider.clone(),
        )
        .record(start.elapsed().as_secs_f64());

        let response = result?;
        if let Some(usage) = &response.usage {
            metrics::counter!(telemetry::TOKENS_TOTAL,
                "provider" => entry.provider.clone(), "direction" => "prompt")
            .increment(usage.prompt_tokens as u64);
            metrics::counter!(telemetry::TOKENS_TOTAL,
                "provider" => entry.provider.clone(), "direction" => "completion")
            .increment(usage.completion_tokens as u64);
        }
        Ok(response)
    }

    /// Deterministic, provider-independent token estimate for pre-flight
    /// budgeting.
    ///
    /// Length-based heuristic (≈4 characters per token over message
    /// content and serialized tool declarations, plus a small
    /// per-message overhead). This is explicitly an estimate, not a
    /// billing-accurate count — use the provider-reported
    /// [`Usage`](crate::types::Usage) for accounting.
    pub fn estimate_tokens(&self, request: &CompletionRequest) -> u32 {
        estimate_tokens(request)
    }
}

/// Free-function form of [`ProviderRouter::estimate_tokens`], usable
/// without a router instance.
pub fn estimate_tokens(request: &CompletionRequest) -> u32 {
    const CHARS_PER_TOKEN: usize = 4;
    const PER_MESSAGE_OVERHEAD: usize = 4;

    let mut chars = 0;
    for message in &request.messages {
        chars += message.content.chars().count() + PER_MESSAGE_OVERHEAD * CHARS_PER_TOKEN;
        if let Some(calls) = &message.tool_calls {
            for call in calls {
                chars += call.name.len() + call.arguments.to_string().chars().count();
            }
        }
    }
    for tool in &request.tools {
        chars += tool.name.len()
            + tool.description.chars().count()
            + tool.parameters.to_string().chars().count();
    }
    chars.div_ceil(CHARS_PER_TOKEN) as u32
}
