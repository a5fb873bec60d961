//! The cache contract consumed by list engines.

use std::sync::Arc;

use futures::future::BoxFuture;
use pagewise_core::{PageResult, QueryKey, Result};

use crate::{CacheOptions, CacheStats, InvalidateOptions};

/// A deferred page fetch, only polled on a cache miss.
pub type PageLoad<T> = BoxFuture<'static, Result<PageResult<T>>>;

/// Shared, type-erased cache handle.
pub type SharedCache<T> = Arc<dyn QueryCache<T>>;

/// Key-addressed request cache.
///
/// Implementations are shared between engines and must be safe for
/// concurrent use.
#[async_trait::async_trait]
pub trait QueryCache<T>: Send + Sync {
    /// Returns the cached page when fresh, otherwise drives `load` and caches
    /// its result.
    ///
    /// Failed loads are returned to the caller and never cached.
    async fn fetch_or_get(
        &self,
        key: &QueryKey,
        load: PageLoad<T>,
        options: &CacheOptions,
    ) -> Result<PageResult<T>>;

    /// Returns the cached page for `key`, fresh or not.
    async fn get_cached(&self, key: &QueryKey) -> Option<PageResult<T>>;

    /// Stores `page` under `key`.
    async fn set_cached(&self, key: &QueryKey, page: PageResult<T>, options: &CacheOptions);

    /// Removes cached entries matching `prefix`, returning how many were removed.
    ///
    /// Loads in flight for a matching key still resolve for their caller but
    /// are not written back.
    async fn invalidate(&self, prefix: &QueryKey, options: InvalidateOptions) -> usize;

    /// Returns a snapshot of cache statistics.
    fn stats(&self) -> CacheStats;
}
