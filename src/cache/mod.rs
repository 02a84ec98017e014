//! TTL cache over the shared backing store.
//!
//! [`CacheStore`] fronts expensive, quota-limited external calls: on a
//! miss it runs the caller-supplied compute function and writes the
//! result back with a TTL. Keys are grouped by namespace
//! (`namespace:key`) so related entries can be inspected and
//! invalidated together.
//!
//! # Concurrency
//!
//! Two callers racing on the same missing key may both compute; the
//! write-back is a conditional update against the value observed at
//! lookup, so exactly one write wins and the loser keeps its own
//! computed value. Duplicate compute is a bounded performance cost,
//! never a correctness violation. There is deliberately no single-flight
//! lock — see DESIGN.md.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::store::StoreBackend;
use crate::telemetry;
use crate::{BifrostError, Result};

/// Fallback TTL for namespaces without a configured default.
const FALLBACK_TTL: Duration = Duration::from_secs(300);

/// Keyed, TTL-based cache of previously computed values.
pub struct CacheStore {
    store: Arc<dyn StoreBackend>,
    /// Default TTL per namespace, loaded once at startup.
    namespace_ttls: HashMap<String, Duration>,
}

impl CacheStore {
    pub fn new(store: Arc<dyn StoreBackend>) -> Self {
        Self {
            store,
            namespace_ttls: HashMap::new(),
        }
    }

    /// Configure default TTLs per namespace (used by
    /// [`get_or_compute_default`](Self::get_or_compute_default)).
    #[must_use]
    pub fn with_namespace_ttls(mut self, ttls: HashMap<String, Duration>) -> Self {
        self.namespace_ttls = ttls;
        self
    }

    /// Default TTL for a namespace (300s when unconfigured).
    pub fn default_ttl(&self, namespace: &str) -> Duration {
        self.namespace_ttls
            .get(namespace)
            .copied()
            .unwrap_or(FALLBACK_TTL)
    }

    /// Return the cached value for `namespace:key`, computing and storing
    /// it on miss.
    ///
    /// On a hit the compute function is not invoked. On a miss (or
    /// expired entry) `compute` runs exactly once in this call, its
    /// result is stored with `expires_at = now + ttl`, and returned. If
    /// `compute` fails nothing is written and the failure propagates —
    /// a failed compute never populates the cache.
    ///
    /// Cancelling via `cancel` aborts the compute wait and returns
    /// [`BifrostError::Cancelled`] without writing anything.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        namespace: &str,
        key: &str,
        ttl: Duration,
        compute: F,
        cancel: &CancellationToken,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let full_key = full_key(namespace, key);
        let observed = self.store.get(&full_key).await?;
        if let Some(bytes) = &observed {
            match serde_json::from_slice(bytes) {
                Ok(value) => {
                    metrics::counter!(telemetry::CACHE_HITS_TOTAL, "namespace" => namespace.to_owned())
                        .increment(1);
                    debug!(namespace, key, "cache hit");
                    return Ok(value);
                }
                Err(e) => {
                    // Undecodable entry: treat as a miss and overwrite.
                    warn!(namespace, key, error = %e, "evicting undecodable cache entry");
                }
            }
        }
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "namespace" => namespace.to_owned())
            .increment(1);
        debug!(namespace, key, "cache miss");

        let value = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BifrostError::Cancelled),
            result = compute() => result?,
        };

        let payload = serde_json::to_vec(&value)?;
        // Conditional write keyed on what we observed at lookup: when two
        // computations race, exactly one write wins. Losing the race is
        // fine — this caller still returns its own computed value.
        let won = self
            .store
            .compare_and_swap(&full_key, observed.as_deref(), payload, Some(ttl))
            .await?;
        if !won {
            debug!(namespace, key, "lost cache write race");
        }
        Ok(value)
    }

    /// As [`get_or_compute`](Self::get_or_compute), using the
    /// namespace's configured default TTL.
    pub async fn get_or_compute_default<T, F, Fut>(
        &self,
        namespace: &str,
        key: &str,
        compute: F,
        cancel: &CancellationToken,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let ttl = self.default_ttl(namespace);
        self.get_or_compute(namespace, key, ttl, compute, cancel)
            .await
    }

    /// Remove one entry immediately.
    pub async fn invalidate(&self, namespace: &str, key: &str) -> Result<()> {
        self.store.delete(&full_key(namespace, key)).await
    }

    /// Remove every entry under a namespace. Used for explicit
    /// cache-busting after a write that supersedes cached reads.
    pub async fn invalidate_namespace(&self, namespace: &str) -> Result<u64> {
        let removed = self.store.delete_prefix(&format!("{namespace}:")).await?;
        debug!(namespace, removed, "invalidated namespace");
        Ok(removed)
    }
}

fn full_key(namespace: &str, key: &str) -> String {
    format!("{namespace}:{key}")
}
