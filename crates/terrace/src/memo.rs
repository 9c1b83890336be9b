//! Memoization of derived tables.
//!
//! The original deployment leaned on its hosting framework to cache every
//! derived table for the lifetime of the process. Here that contract is
//! explicit: results are stored under `(operation, argument fingerprint)`
//! with a TTL and a capacity bound. Recomputation is cheap and idempotent,
//! so concurrent callers may duplicate work for the same key; they can
//! never observe a wrong result.

use std::any::Any;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

type Key = (&'static str, u64);

#[derive(Clone)]
struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    inserted_at: Instant,
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("inserted_at", &self.inserted_at)
            .finish_non_exhaustive()
    }
}

/// TTL-bound cache from `(operation, argument fingerprint)` to a computed
/// result.
#[derive(Debug)]
pub struct MemoCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<Key, Entry>>,
}

impl MemoCache {
    /// Create a cache with the given TTL and capacity bound.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fingerprint canonicalized arguments for use as a cache key.
    pub fn fingerprint<A: Hash>(args: &A) -> u64 {
        let mut hasher = DefaultHasher::new();
        args.hash(&mut hasher);
        hasher.finish()
    }

    /// Return the cached value for `(op, fingerprint)`, computing and
    /// storing it on a miss or after expiry.
    ///
    /// The computation runs outside the cache lock, so identical in-flight
    /// requests may compute twice; the second insert simply wins.
    pub fn get_or_compute<T, E, F>(
        &self,
        op: &'static str,
        fingerprint: u64,
        compute: F,
    ) -> Result<Arc<T>, E>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        let key = (op, fingerprint);
        if let Some(entry) = self.lock().get(&key) {
            if entry.inserted_at.elapsed() < self.ttl {
                if let Ok(value) = entry.value.clone().downcast::<T>() {
                    return Ok(value);
                }
            }
        }

        let value = Arc::new(compute()?);
        let mut entries = self.lock();
        if entries.len() >= self.capacity {
            evict(&mut entries, self.ttl);
        }
        entries.insert(
            key,
            Entry {
                value: value.clone(),
                inserted_at: Instant::now(),
            },
        );
        Ok(value)
    }

    /// Drop every cached result.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of cached results, expired entries included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Key, Entry>> {
        // A poisoned lock only means a panic mid-insert; the map is still
        // a valid cache.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Drop expired entries; if nothing has expired, drop the oldest.
fn evict(entries: &mut HashMap<Key, Entry>, ttl: Duration) {
    let before = entries.len();
    entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
    if entries.len() == before {
        if let Some(oldest) = entries
            .iter()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(key, _)| *key)
        {
            entries.remove(&oldest);
        }
    }
}
