//! Concurrent map from content-and-size keys to rendered frames.
//!
//! Sharing scope follows the environment rather than the process: every
//! provider created from one `ThumbnailEnv` shares that environment's
//! cache, and process-wide sharing means handing one environment to
//! every consumer. Environments with different device scales keep
//! separate caches, since their rendered frames are not interchangeable.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::{CacheKey, Frame};

/// Capacity policy for the thumbnail cache.
///
/// The observed behavior retains entries indefinitely, so unbounded is
/// the default; bounding is an opt-in, non-breaking extension.
#[derive(Debug, Clone, Copy, Default)]
pub enum CacheCapacity {
    /// Retain every entry until `clear`.
    #[default]
    Unbounded,
    /// Evict least-recently-used entries beyond this count.
    Bounded(NonZeroUsize),
}

enum Store {
    Unbounded(HashMap<CacheKey, Frame>),
    Bounded(LruCache<CacheKey, Frame>),
}

impl Store {
    fn get(&mut self, key: &CacheKey) -> Option<Frame> {
        match self {
            Self::Unbounded(map) => map.get(key).cloned(),
            Self::Bounded(lru) => lru.get(key).cloned(),
        }
    }

    fn put(&mut self, key: CacheKey, frame: Frame) {
        match self {
            Self::Unbounded(map) => {
                map.insert(key, frame);
            }
            Self::Bounded(lru) => {
                lru.put(key, frame);
            }
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Unbounded(map) => map.len(),
            Self::Bounded(lru) => lru.len(),
        }
    }

    fn clear(&mut self) {
        match self {
            Self::Unbounded(map) => map.clear(),
            Self::Bounded(lru) => lru.clear(),
        }
    }
}

/// Concurrent in-memory thumbnail cache.
///
/// Each `get`/`put` is its own short critical section; the lock is never
/// held across generation or delivery. A miss is not an error, only the
/// trigger for regeneration. A later `put` for the same key fully
/// replaces the entry (last write wins).
pub struct ThumbnailCache {
    store: Mutex<Store>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ThumbnailCache {
    /// Creates a cache with the given capacity policy.
    #[must_use]
    pub fn new(capacity: CacheCapacity) -> Self {
        let store = match capacity {
            CacheCapacity::Unbounded => Store::Unbounded(HashMap::new()),
            CacheCapacity::Bounded(cap) => Store::Bounded(LruCache::new(cap)),
        };
        Self {
            store: Mutex::new(store),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Looks up a rendered frame.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Frame> {
        let found = self.store.lock().get(key);
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "thumbnail cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "thumbnail cache miss");
        }
        found
    }

    /// Stores a rendered frame, replacing any previous entry for the key.
    pub fn put(&self, key: CacheKey, frame: Frame) {
        debug!(key = %key, "storing thumbnail");
        self.store.lock().put(key, frame);
    }

    /// Current number of cached frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    /// True when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached frame.
    pub fn clear(&self) {
        self.store.lock().clear();
        debug!("cleared thumbnail cache");
    }

    /// Returns hit/miss statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits,
            misses,
            hit_rate,
            size: self.len(),
        }
    }
}

impl Default for ThumbnailCache {
    fn default() -> Self {
        Self::new(CacheCapacity::Unbounded)
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached frames.
    pub size: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} frames, {:.1}% hit rate ({} hits, {} misses)",
            self.size, self.hit_rate, self.hits, self.misses
        )
    }
}
