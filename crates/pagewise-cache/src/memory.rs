//! In-process query cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::Expiry;
use moka::future::Cache;
use moka::notification::RemovalCause;
use moka::ops::compute::{CompResult, Op};
use pagewise_core::{Error, PageResult, QueryKey, Result};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::{
    CacheOptions, CacheStats, InvalidateOptions, PageLoad, QueryCache, TRACING_TARGET_CACHE,
    TRACING_TARGET_INVALIDATE,
};

struct Entry<T> {
    page: PageResult<T>,
    fetched_at: Instant,
    gc_time: Duration,
}

impl<T> Entry<T> {
    fn new(page: PageResult<T>, gc_time: Duration) -> Arc<Self> {
        Arc::new(Self {
            page,
            fetched_at: Instant::now(),
            gc_time,
        })
    }

    fn is_fresh(&self, stale_time: Duration) -> bool {
        self.fetched_at.elapsed() < stale_time
    }
}

/// Keeps an entry for its `gc_time` after the last write or read.
struct Retention;

impl<T> Expiry<QueryKey, Arc<Entry<T>>> for Retention {
    fn expire_after_create(
        &self,
        _key: &QueryKey,
        entry: &Arc<Entry<T>>,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(entry.gc_time)
    }

    fn expire_after_read(
        &self,
        _key: &QueryKey,
        entry: &Arc<Entry<T>>,
        _read_at: std::time::Instant,
        _remaining: Option<Duration>,
        _last_modified_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(entry.gc_time)
    }

    fn expire_after_update(
        &self,
        _key: &QueryKey,
        entry: &Arc<Entry<T>>,
        _updated_at: std::time::Instant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.gc_time)
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
    evictions: AtomicU64,
    /// Bumped by every invalidation; a load that saw it change is not cached.
    generation: AtomicU64,
}

/// Query cache held in process memory, backed by [`moka`].
///
/// Loads of one key are serialized: a caller arriving while a load is in
/// flight waits for it and reuses its result. Entries expire once unread for
/// their `gc_time`.
///
/// Cheap to clone; clones share the same entries.
pub struct MemoryCache<T> {
    entries: Cache<QueryKey, Arc<Entry<T>>>,
    counters: Arc<Counters>,
}

impl<T> Clone for MemoryCache<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<T> std::fmt::Debug for MemoryCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.entries.entry_count())
            .finish_non_exhaustive()
    }
}

impl<T> Default for MemoryCache<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MemoryCache<T>
where
    T: Send + Sync + 'static,
{
    /// Creates an empty cache.
    pub fn new() -> Self {
        let counters = Arc::new(Counters::default());
        let evicted = Arc::clone(&counters);
        let entries = Cache::builder()
            .name("pagewise")
            .expire_after(Retention)
            .eviction_listener(move |key: Arc<QueryKey>, _, cause| {
                if matches!(cause, RemovalCause::Expired) {
                    evicted.evictions.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        target: TRACING_TARGET_INVALIDATE,
                        key = %key,
                        "Evicted unused cache entry"
                    );
                }
            })
            .build();

        Self { entries, counters }
    }

    /// Returns the number of cached entries.
    ///
    /// The count lags behind writes until [`run_pending_tasks`] runs.
    ///
    /// [`run_pending_tasks`]: Self::run_pending_tasks
    pub fn len(&self) -> usize {
        usize::try_from(self.entries.entry_count()).unwrap_or(usize::MAX)
    }

    /// Returns whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns whether an unexpired entry exists for `key`.
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns all cached keys.
    pub fn keys(&self) -> Vec<QueryKey> {
        self.entries
            .iter()
            .map(|(key, _)| key.as_ref().clone())
            .collect()
    }

    /// Applies pending writes, expirations and evictions.
    pub async fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks().await;
    }
}

#[async_trait::async_trait]
impl<T> QueryCache<T> for MemoryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn fetch_or_get(
        &self,
        key: &QueryKey,
        load: PageLoad<T>,
        options: &CacheOptions,
    ) -> Result<PageResult<T>> {
        if let Some(entry) = self.entries.get(key).await
            && entry.is_fresh(options.stale_time)
        {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(target: TRACING_TARGET_CACHE, key = %key, "Cache hit");
            return Ok(entry.page.clone());
        }

        let requested_at = Instant::now();
        let generation = self.counters.generation.load(Ordering::Acquire);
        let CacheOptions {
            stale_time,
            gc_time,
        } = *options;
        let counters = Arc::clone(&self.counters);
        let (loaded_tx, mut loaded_rx) = oneshot::channel();
        let load_key = key.clone();

        let outcome = self
            .entries
            .entry_by_ref(key)
            .and_try_compute_with(move |current| async move {
                // Written by a load that finished while this caller waited.
                if let Some(current) = current {
                    let entry = current.into_value();
                    if entry.fetched_at >= requested_at || entry.is_fresh(stale_time) {
                        return Ok::<_, Error>(Op::Nop);
                    }
                }

                counters.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    target: TRACING_TARGET_CACHE,
                    key = %load_key,
                    "Cache miss, loading"
                );

                let page = load.await?;
                let _ = loaded_tx.send(page.clone());

                if counters.generation.load(Ordering::Acquire) != generation {
                    tracing::debug!(
                        target: TRACING_TARGET_INVALIDATE,
                        key = %load_key,
                        "Cache invalidated during load, result not cached"
                    );
                    return Ok(Op::Nop);
                }

                tracing::debug!(
                    target: TRACING_TARGET_CACHE,
                    key = %load_key,
                    items = page.len(),
                    "Cached loaded page"
                );
                Ok(Op::Put(Entry::new(page, gc_time)))
            })
            .await?;

        if let Ok(page) = loaded_rx.try_recv() {
            return Ok(page);
        }

        match outcome {
            CompResult::Unchanged(entry)
            | CompResult::Inserted(entry)
            | CompResult::ReplacedWith(entry) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    target: TRACING_TARGET_CACHE,
                    key = %key,
                    "Cache hit after joining in-flight load"
                );
                Ok(entry.into_value().page.clone())
            }
            CompResult::Removed(_) | CompResult::StillNone(_) => Err(Error::cancelled()
                .with_message("cache entry removed before it could be read")
                .with_context(key.to_string())),
        }
    }

    async fn get_cached(&self, key: &QueryKey) -> Option<PageResult<T>> {
        self.entries.get(key).await.map(|entry| entry.page.clone())
    }

    async fn set_cached(&self, key: &QueryKey, page: PageResult<T>, options: &CacheOptions) {
        self.entries
            .insert(key.clone(), Entry::new(page, options.gc_time))
            .await;
        tracing::debug!(target: TRACING_TARGET_CACHE, key = %key, "Stored page manually");
    }

    async fn invalidate(&self, prefix: &QueryKey, options: InvalidateOptions) -> usize {
        self.counters.generation.fetch_add(1, Ordering::AcqRel);

        let matching: Vec<Arc<QueryKey>> = if options.exact {
            vec![Arc::new(prefix.clone())]
        } else {
            self.entries
                .iter()
                .filter(|(key, _)| key.starts_with(prefix))
                .map(|(key, _)| key)
                .collect()
        };

        let mut removed = 0;
        for key in matching {
            if self.entries.remove(key.as_ref()).await.is_some() {
                removed += 1;
            }
        }

        self.counters
            .invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
        tracing::debug!(
            target: TRACING_TARGET_INVALIDATE,
            prefix = %prefix,
            exact = options.exact,
            removed,
            "Invalidated cache entries"
        );

        removed
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }
}
