//! Per-call cache options.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default time an unused entry stays in the cache: 5 minutes.
pub const DEFAULT_GC_TIME: Duration = Duration::from_secs(5 * 60);

/// Freshness and retention settings for one cached query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheOptions {
    /// How long a fetched value is served without refetching.
    pub stale_time: Duration,
    /// How long an entry survives without being read.
    pub gc_time: Duration,
}

impl CacheOptions {
    /// Creates options with the given freshness window.
    pub fn new(stale_time: Duration, gc_time: Duration) -> Self {
        Self {
            stale_time,
            gc_time,
        }
    }

    /// Sets the freshness window.
    #[must_use]
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    /// Sets the retention window.
    #[must_use]
    pub fn with_gc_time(mut self, gc_time: Duration) -> Self {
        self.gc_time = gc_time;
        self
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
            gc_time: DEFAULT_GC_TIME,
        }
    }
}

/// Scope of an invalidation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvalidateOptions {
    /// Only remove the identical key instead of every key under the prefix.
    pub exact: bool,
}

impl InvalidateOptions {
    /// Invalidates every key starting with the prefix.
    pub const fn prefix() -> Self {
        Self { exact: false }
    }

    /// Invalidates only the identical key.
    pub const fn exact() -> Self {
        Self { exact: true }
    }
}
