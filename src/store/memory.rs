//! Embedded in-process store backend.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::StoreBackend;
use crate::Result;

#[derive(Debug, Clone)]
struct Slot {
    payload: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Slot {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-memory [`StoreBackend`] with lazy TTL expiry and compare-and-swap.
///
/// Single-process stand-in for the shared networked store: the same
/// atomicity contract, scoped to one process. The whole map sits behind
/// one mutex; every operation is a short critical section with no await
/// points inside, so contention stays bounded.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Slot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        // A poisoned lock only means a panic elsewhere mid-operation;
        // the map itself is still structurally valid.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().values().filter(|s| !s.expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StoreBackend for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(slot) if slot.expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(slot) => Ok(Some(slot.payload.clone())),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, payload: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let slot = Slot {
            payload,
            expires_at: ttl.map(|t| Instant::now() + t),
        };
        self.lock().insert(key.to_owned(), slot);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        payload: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let now = Instant::now();
        let mut entries = self.lock();
        let current = entries.get(key).filter(|slot| !slot.expired(now));
        let matches = match (current, expected) {
            (None, None) => true,
            (Some(slot), Some(bytes)) => slot.payload == bytes,
            _ => false,
        };
        if matches {
            entries.insert(
                key.to_owned(),
                Slot {
                    payload,
                    expires_at: ttl.map(|t| now + t),
                },
            );
        }
        Ok(matches)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
