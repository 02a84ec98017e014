//! Gateway entry point wiring the core together.
//!
//! [`Bifrost::builder()`] assembles the four components around one
//! shared store backend: the cache, the rate limiter, and the provider
//! router (which uses the limiter and the retry executor internally).
//! Collaborators (workers, bot gateway) hold a single [`Bifrost`] and
//! call into it.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cache::CacheStore;
use crate::config::{BifrostConfig, ProviderKind};
use crate::limiter::RateLimiter;
use crate::router::{AnthropicAdapter, OpenAiAdapter, ProviderAdapter, ProviderRouter};
use crate::store::{MemoryStore, StoreBackend};
use crate::types::{CompletionRequest, CompletionResponse, ProviderTier};
use crate::Result;

/// Main entry point for creating a wired core.
pub struct Bifrost {
    cache: CacheStore,
    limiter: Arc<RateLimiter>,
    router: ProviderRouter,
    store: Arc<dyn StoreBackend>,
}

impl Bifrost {
    /// Create a new builder.
    pub fn builder() -> BifrostBuilder {
        BifrostBuilder::new()
    }

    /// The cache store.
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// The shared rate limiter.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// The provider router.
    pub fn router(&self) -> &ProviderRouter {
        &self.router
    }

    /// Complete a request via the router (convenience passthrough).
    pub async fn complete(
        &self,
        request: &CompletionRequest,
        tier: ProviderTier,
        cancel: &CancellationToken,
    ) -> Result<CompletionResponse> {
        self.router.complete(request, tier, cancel).await
    }

    /// Whether the backing store answers a liveness probe.
    pub async fn store_healthy(&self) -> bool {
        self.store.ping().await.is_ok()
    }
}

/// Builder for configuring a [`Bifrost`] instance.
pub struct BifrostBuilder {
    config: BifrostConfig,
    store: Option<Arc<dyn StoreBackend>>,
    extra_adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl BifrostBuilder {
    pub fn new() -> Self {
        Self {
            config: BifrostConfig::default(),
            store: None,
            extra_adapters: Vec::new(),
        }
    }

    /// Supply the startup configuration (resources, tiers, namespaces).
    pub fn config(mut self, config: BifrostConfig) -> Self {
        self.config = config;
        self
    }

    /// Inject the shared store backend. Defaults to an embedded
    /// [`MemoryStore`] when unset — fine for a single process, but
    /// cross-process quota sharing needs a networked backend here.
    pub fn store(mut self, store: Arc<dyn StoreBackend>) -> Self {
        self.store = Some(store);
        self
    }

    /// Register a hand-built adapter (e.g. a custom resource name or a
    /// mock in tests). Takes precedence over config-declared providers
    /// with the same id.
    pub fn adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.extra_adapters.push(adapter);
        self
    }

    /// Wire everything up.
    pub fn build(self) -> Result<Bifrost> {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn StoreBackend>);

        let limiter = Arc::new(RateLimiter::new(
            Arc::clone(&store),
            self.config.resources.clone(),
        ));
        let cache = CacheStore::new(Arc::clone(&store))
            .with_namespace_ttls(self.config.namespace_ttls());

        let mut router = ProviderRouter::new(
            self.config.tiers.clone(),
            Arc::clone(&limiter),
            self.config.retry.to_policy(),
        );
        for (id, provider) in &self.config.providers {
            let api_key = provider.resolve_api_key(id)?;
            let resource = provider.resource.clone().unwrap_or_else(|| id.clone());
            let adapter: Arc<dyn ProviderAdapter> = match provider.kind {
                ProviderKind::Anthropic => {
                    let adapter = match &provider.base_url {
                        Some(url) => AnthropicAdapter::with_base_url(&api_key, url),
                        None => AnthropicAdapter::new(&api_key),
                    };
                    Arc::new(adapter.resource(resource))
                }
                ProviderKind::Openai => {
                    let adapter = match &provider.base_url {
                        Some(url) => OpenAiAdapter::with_base_url(&api_key, url),
                        None => OpenAiAdapter::new(&api_key),
                    };
                    Arc::new(adapter.resource(resource))
                }
            };
            router.add_adapter(adapter);
        }
        for adapter in self.extra_adapters {
            router.add_adapter(adapter);
        }

        Ok(Bifrost {
            cache,
            limiter,
            router,
            store,
        })
    }
}

impl Default for BifrostBuilder {
    fn default() -> Self {
        Self::new()
    }
}
