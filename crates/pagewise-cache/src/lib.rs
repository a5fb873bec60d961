#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for cache reads, writes and fetches.
pub const TRACING_TARGET_CACHE: &str = "pagewise_cache::cache";

/// Tracing target for invalidation and garbage collection.
pub const TRACING_TARGET_INVALIDATE: &str = "pagewise_cache::invalidate";

mod memory;
mod options;
mod query_cache;
mod stats;

pub use memory::MemoryCache;
pub use options::{CacheOptions, DEFAULT_GC_TIME, InvalidateOptions};
pub use query_cache::{PageLoad, QueryCache, SharedCache};
pub use stats::CacheStats;
