//! Embedding cache.
//!
//! Re-computing vectors for text the embedder has already seen wastes a
//! network round-trip per candidate, and `update` is called once per
//! dialogue turn. Keys are `sha256(text | model)` so different models never
//! share entries and keys are stable across restarts.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache performance counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of evictions due to capacity.
    pub evictions: u64,
    /// Number of entries currently cached.
    pub entry_count: usize,
}

impl CacheStats {
    /// Hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Configuration for the embedding cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached embeddings.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Whether the cache is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_max_entries() -> usize {
    4096
}

fn default_enabled() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            enabled: default_enabled(),
        }
    }
}

/// Interface for embedding caches.
pub trait EmbeddingCache: Send + Sync {
    /// Get a cached embedding.
    fn get(&self, key: &str) -> Option<Vec<f32>>;

    /// Store an embedding.
    fn set(&self, key: &str, embedding: Vec<f32>);

    /// Remove one entry.
    fn invalidate(&self, key: &str);

    /// Remove all entries.
    fn clear(&self);

    /// Get cache statistics.
    fn stats(&self) -> CacheStats;

    /// Compute the cache key for a text and model pair.
    fn compute_key(&self, text: &str, model: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(b"|");
        hasher.update(model.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Whether the cache is active.
    fn is_enabled(&self) -> bool;
}

struct CacheEntry {
    embedding: Vec<f32>,
    /// Logical access time; larger = more recent.
    last_used: u64,
}

/// In-memory, count-bounded LRU cache.
///
/// Eviction scans for the smallest logical access time, which is linear in
/// the entry count; with the default capacity that is cheaper than the
/// bookkeeping of a linked LRU and keeps the structure trivial.
pub struct LruEmbeddingCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    config: CacheConfig,
    tick: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl LruEmbeddingCache {
    /// Create a cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
            tick: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Create a cache with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Create a cache bounded to `max_entries` embeddings.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self::new(CacheConfig {
            max_entries,
            ..Default::default()
        })
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed)
    }
}

impl EmbeddingCache for LruEmbeddingCache {
    fn get(&self, key: &str) -> Option<Vec<f32>> {
        if !self.config.enabled {
            return None;
        }

        let tick = self.next_tick();
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(entry) => {
                entry.last_used = tick;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.embedding.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn set(&self, key: &str, embedding: Vec<f32>) {
        if !self.config.enabled || self.config.max_entries == 0 {
            return;
        }

        let tick = self.next_tick();
        let mut entries = self.entries.lock();

        if !entries.contains_key(key) && entries.len() >= self.config.max_entries {
            let lru_key = entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            if let Some(lru_key) = lru_key {
                entries.remove(&lru_key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        entries.insert(
            key.to_string(),
            CacheEntry {
                embedding,
                last_used: tick,
            },
        );
    }

    fn invalidate(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entry_count: self.entries.lock().len(),
        }
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

/// A cache that stores nothing.
///
/// Lets callers disable caching without changing code structure.
#[derive(Debug, Default)]
pub struct NoOpCache;

impl NoOpCache {
    /// Create a new no-op cache.
    pub fn new() -> Self {
        Self
    }
}

impl EmbeddingCache for NoOpCache {
    fn get(&self, _key: &str) -> Option<Vec<f32>> {
        None
    }

    fn set(&self, _key: &str, _embedding: Vec<f32>) {}

    fn invalidate(&self, _key: &str) {}

    fn clear(&self) {}

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
