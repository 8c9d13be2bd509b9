//! Feature cache with lazy TTL expiration.
//!
//! Holds the last feature read from the store for each flag name. The
//! engine only consults it when the store itself fails, so it never
//! shadows fresher data. Expired entries are dropped when they are looked
//! up; there is no background sweeper.
//!
//! Cache statistics (hits, misses, expirations) are emitted as
//! `tracing::debug` fields.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::feature::Feature;

/// Configuration for the feature cache.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Time-to-live for cache entries (default: 300 seconds).
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
        }
    }
}

impl CacheConfig {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl }
    }
}

struct CacheEntry {
    feature: Feature,
    /// When this entry was inserted (for TTL calculation).
    cached_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
    expirations: u64,
}

/// Thread-safe TTL cache of feature reads.
///
/// A single mutex guards the map. The store is the source of truth, so the
/// lock only has to keep the map consistent, not order reads against
/// writes.
pub struct FeatureCache {
    state: Mutex<CacheState>,
    config: CacheConfig,
}

impl FeatureCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            config,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Look up a flag, returning a copy if present and not expired.
    ///
    /// An expired entry is removed and reported as a miss.
    pub fn get(&self, name: &str) -> Option<Feature> {
        let mut state = self.lock();

        let expired = match state.entries.get(name) {
            Some(entry) => entry.is_expired(self.config.ttl),
            None => {
                state.misses += 1;
                tracing::debug!(
                    feature = %name,
                    cache_hits = state.hits,
                    cache_misses = state.misses,
                    "feature cache miss"
                );
                return None;
            }
        };

        if expired {
            state.entries.remove(name);
            state.misses += 1;
            state.expirations += 1;
            tracing::debug!(
                feature = %name,
                cache_hits = state.hits,
                cache_misses = state.misses,
                cache_expirations = state.expirations,
                "feature cache miss (expired)"
            );
            return None;
        }

        state.hits += 1;
        tracing::debug!(
            feature = %name,
            cache_hits = state.hits,
            cache_misses = state.misses,
            "feature cache hit"
        );
        state.entries.get(name).map(|entry| entry.feature.clone())
    }

    /// Insert or refresh the entry for `name`.
    pub fn put(&self, name: &str, feature: Feature) {
        self.lock().entries.insert(
            name.to_string(),
            CacheEntry {
                feature,
                cached_at: Instant::now(),
            },
        );
    }

    pub fn remove(&self, name: &str) {
        self.lock().entries.remove(name);
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        let dropped = state.entries.len();
        state.entries.clear();
        tracing::debug!(dropped, "feature cache cleared");
    }

    /// `(hits, misses, expirations)` since creation.
    pub fn stats(&self) -> (u64, u64, u64) {
        let state = self.lock();
        (state.hits, state.misses, state.expirations)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Entries are replaced whole, so a poisoned map is still consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
