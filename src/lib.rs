//! Bifrost - resilience and provider-orchestration core
//!
//! This crate is the coordination layer between worker processes and
//! the external world: it rate-limits and caches calls to quota-limited
//! APIs, retries transient failures with bounded jittered backoff, and
//! routes completion requests to interchangeable AI-inference providers
//! with ordered failover and schema translation between tool-calling
//! formats.
//!
//! Cache entries and token-bucket state live in a shared key/value
//! store (see [`store::StoreBackend`]), so every worker process draws
//! from the same quotas and cache.
//!
//! # Completion Example
//!
//! ```rust,no_run
//! use bifrost::{Bifrost, BifrostConfig, CompletionRequest, Message, ProviderTier};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> bifrost::Result<()> {
//!     let config = BifrostConfig::from_file("/etc/bifrost/config.toml")?;
//!     let core = Bifrost::builder().config(config).build()?;
//!
//!     let request = CompletionRequest::new(vec![
//!         Message::system("You are a helpful assistant."),
//!         Message::user("How did I sleep last night?"),
//!     ]);
//!     let cancel = CancellationToken::new();
//!     let response = core.complete(&request, ProviderTier::Balanced, &cancel).await?;
//!
//!     println!("{}", response.content);
//!     Ok(())
//! }
//! ```
//!
//! # Cached External Call Example
//!
//! ```rust,no_run
//! # use bifrost::Bifrost;
//! # use std::time::Duration;
//! # use tokio_util::sync::CancellationToken;
//! # async fn fetch_weather() -> bifrost::Result<String> { Ok(String::new()) }
//! # async fn demo(core: &Bifrost) -> bifrost::Result<()> {
//! let cancel = CancellationToken::new();
//! let report: String = core
//!     .cache()
//!     .get_or_compute("cache:weather", "seoul", Duration::from_secs(600), || async {
//!         fetch_weather().await
//!     }, &cancel)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod limiter;
pub mod retry;
pub mod router;
pub mod store;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use cache::CacheStore;
pub use config::{BifrostConfig, ProviderConfig, ProviderKind, RetrySettings, RouteEntry, TierRoutes};
pub use error::{BifrostError, Result};
pub use gateway::{Bifrost, BifrostBuilder};
pub use limiter::{BucketConfig, RateLimiter};
pub use retry::RetryPolicy;
pub use router::{
    AnthropicAdapter, OpenAiAdapter, ProviderAdapter, ProviderFailure, ProviderRouter,
    estimate_tokens,
};
pub use store::{MemoryStore, StoreBackend};

// Re-export all request/response types
pub use types::{
    CompletionRequest, CompletionResponse, FinishReason, Message, ProviderTier, Role,
    ToolInvocation, ToolSpec, Usage,
};
