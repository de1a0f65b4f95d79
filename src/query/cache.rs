//! Bounded, time-expiring query result cache.
//!
//! The cache is passive memoization on the side of the query engine:
//! correctness is identical with it on or off. Keys are the SHA-256 of
//! the query's canonical JSON form (property maps are `BTreeMap`s, so
//! serialization is deterministic). Reads use `peek` — no recency
//! promotion — so the underlying LRU order stays insertion order and a
//! full cache evicts its single oldest entry.

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use lru::LruCache;
use sha2::{Digest, Sha256};

use crate::query::{GraphQuery, QueryResult};
use crate::types::Timestamp;

struct CacheEntry {
    result: QueryResult,
    inserted_at: Timestamp,
}

/// Insertion-ordered, TTL-expiring result cache.
///
/// Lock discipline: the cache has its own mutex, taken independently of
/// the store lock — the two are never held together.
pub(crate) struct QueryCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl_ms: i64,
}

impl QueryCache {
    /// Creates a cache bounded to `capacity` entries with the given TTL.
    pub fn new(capacity: usize, ttl_ms: i64) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl_ms,
        }
    }

    /// Returns the unexpired cached result for a key, if any.
    ///
    /// Expired entries are dropped on the way out and report a miss.
    pub fn get(&self, key: &str) -> Option<QueryResult> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let expired = match entries.peek(key) {
            None => return None,
            Some(entry) => {
                Timestamp::now().as_millis() - entry.inserted_at.as_millis() >= self.ttl_ms
            }
        };
        if expired {
            entries.pop(key);
            return None;
        }

        entries.peek(key).map(|entry| entry.result.clone())
    }

    /// Inserts a result, evicting the oldest entry when full.
    pub fn put(&self, key: String, result: QueryResult) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.put(
            key,
            CacheEntry {
                result,
                inserted_at: Timestamp::now(),
            },
        );
    }

    /// Number of cached entries (including not-yet-collected expired
    /// ones).
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// The cache key for a query: SHA-256 over its canonical JSON form.
pub(crate) fn query_cache_key(query: &GraphQuery) -> String {
    let canonical = serde_json::to_string(query).unwrap_or_default();
    format!("{:x}", Sha256::digest(canonical.as_bytes()))
}
