//! Cache statistics.

use serde::{Deserialize, Serialize};

/// Cache statistics and metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries currently in cache.
    pub entry_count: usize,
    /// Number of `fetch_or_get` calls served from cache.
    pub hits: u64,
    /// Number of `fetch_or_get` calls that ran a load.
    pub misses: u64,
    /// Number of entries removed by invalidation.
    pub invalidations: u64,
    /// Number of entries removed by garbage collection.
    pub evictions: u64,
}

impl CacheStats {
    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    /// Fraction of `fetch_or_get` calls served from cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }

    /// Get a human-readable summary of cache stats.
    pub fn summary(&self) -> String {
        format!(
            "{} entries, {} hits, {} misses ({:.1}% hit rate), {} invalidated, {} evicted",
            self.entry_count,
            self.hits,
            self.misses,
            self.hit_rate() * 100.0,
            self.invalidations,
            self.evictions
        )
    }
}
