//! Shared key/value backing store.
//!
//! The cache and rate limiter keep no authoritative in-process state:
//! the "truth" lives in a shared store reachable by every worker process,
//! and correctness across processes depends entirely on the store's
//! atomic conditional-update primitive ([`StoreBackend::compare_and_swap`]),
//! not on any language-level mutex.
//!
//! [`MemoryStore`] is the embedded implementation used by tests and
//! single-process deployments. A networked client (e.g. redis-backed)
//! is a collaborator that implements the same trait and is injected via
//! [`BifrostBuilder::store()`](crate::gateway::BifrostBuilder::store).

mod memory;

pub use memory::MemoryStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

/// Contract the shared key/value service must provide.
///
/// Semantics implementations must uphold:
///
/// - `get` after an entry's TTL has elapsed returns `None`, never the
///   expired payload. Lazy expiry on read is fine.
/// - `compare_and_swap` is atomic with respect to all other writers of
///   the same key, across processes. `expected = None` means "create
///   only if absent".
/// - Transport failures surface as
///   [`BifrostError::StoreUnavailable`](crate::BifrostError::StoreUnavailable);
///   there is no silent fallback.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Read the payload stored under `key`, or `None` if absent/expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write `payload` under `key`. `ttl = None` means no expiry.
    async fn put(&self, key: &str, payload: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Atomically replace the payload under `key` if it currently equals
    /// `expected` (`None` = key absent). Returns whether the swap won.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        payload: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<bool>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove every key starting with `prefix`, returning how many.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64>;

    /// Liveness probe.
    async fn ping(&self) -> Result<()>;
}
