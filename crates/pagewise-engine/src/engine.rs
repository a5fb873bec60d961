//! The infinite-scroll engine.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::FutureExt;
use pagewise_cache::{InvalidateOptions, PageLoad, SharedCache};
use pagewise_core::{Identified, PageResult, QueryKey, Result, SharedFetcher};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::state::Accumulated;
use crate::{
    PagingFailurePolicy, ScrollOptions, ScrollSnapshot, TRACING_TARGET_ENGINE,
    TRACING_TARGET_LIFECYCLE,
};

/// What a load call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Preconditions were not met; nothing happened.
    Skipped,
    /// No more data; `has_next_page` is now false.
    Exhausted,
    /// A page was merged.
    Loaded {
        /// Page number that was merged.
        page: u32,
        /// Items added after de-duplication.
        added: usize,
    },
    /// The fetched first page matched the held one, or deeper pages are held.
    Unchanged,
    /// The fetch failed; the error is in the snapshot.
    Failed,
    /// The load was cancelled or outlived its epoch; the result was dropped.
    Discarded,
}

struct Control<T: Identified> {
    key: QueryKey,
    fetcher: SharedFetcher<T>,
    options: ScrollOptions,
    /// Advanced by `refresh`, `set_key` and `dispose`.
    epoch: u64,
    epoch_token: CancellationToken,
    load_token: Option<CancellationToken>,
    disposed: bool,
    state: Accumulated<T>,
}

impl<T: Identified + Clone> Control<T> {
    fn advance_epoch(&mut self) {
        self.epoch_token.cancel();
        self.epoch_token = CancellationToken::new();
        self.load_token = None;
        self.epoch += 1;
    }
}

struct EngineInner<T: Identified> {
    cache: SharedCache<T>,
    control: Mutex<Control<T>>,
    updates: watch::Sender<ScrollSnapshot<T>>,
}

impl<T: Identified> Drop for EngineInner<T> {
    fn drop(&mut self) {
        let control = self
            .control
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        control.epoch_token.cancel();
    }
}

/// Accumulates pages of one query key into a continuous, de-duplicated list.
///
/// One instance belongs to one mounted consumer. Handles are cheap to clone
/// and share the same state. Every operation recovers its own failures into
/// the snapshot, so none of them return errors.
///
/// Requests are stamped with an epoch. `refresh`, `set_key` and `dispose`
/// cancel the current epoch, so a response that arrives afterwards never
/// touches the new state.
pub struct InfiniteScroll<T: Identified> {
    inner: Arc<EngineInner<T>>,
}

impl<T: Identified> Clone for InfiniteScroll<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Non-owning handle, used by change listeners that must not keep an engine
/// alive.
pub struct WeakInfiniteScroll<T: Identified> {
    inner: Weak<EngineInner<T>>,
}

impl<T: Identified> Clone for WeakInfiniteScroll<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T: Identified> WeakInfiniteScroll<T> {
    /// Returns the engine if it is still alive.
    pub fn upgrade(&self) -> Option<InfiniteScroll<T>> {
        self.inner.upgrade().map(|inner| InfiniteScroll { inner })
    }
}

impl<T> InfiniteScroll<T>
where
    T: Identified + Clone + Send + Sync + 'static,
{
    /// Creates an engine for `key`.
    ///
    /// Nothing is fetched until [`load_initial`] runs.
    ///
    /// [`load_initial`]: Self::load_initial
    pub fn new(
        key: QueryKey,
        fetcher: SharedFetcher<T>,
        cache: SharedCache<T>,
        options: ScrollOptions,
    ) -> Self {
        let state = Accumulated::new();
        let (updates, _) = watch::channel(state.snapshot());
        let control = Control {
            key,
            fetcher,
            options,
            epoch: 0,
            epoch_token: CancellationToken::new(),
            load_token: None,
            disposed: false,
            state,
        };

        Self {
            inner: Arc::new(EngineInner {
                cache,
                control: Mutex::new(control),
                updates,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Control<T>> {
        self.inner
            .control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, control: &Control<T>) {
        self.inner.updates.send_replace(control.state.snapshot());
    }

    fn page_load(fetcher: SharedFetcher<T>, page: u32, page_size: u32) -> PageLoad<T> {
        async move { fetcher.fetch_page(page, page_size).await }.boxed()
    }

    /// Returns a non-owning handle.
    pub fn downgrade(&self) -> WeakInfiniteScroll<T> {
        WeakInfiniteScroll {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Returns the current query key.
    pub fn key(&self) -> QueryKey {
        self.lock().key.clone()
    }

    /// Returns the current options.
    pub fn options(&self) -> ScrollOptions {
        self.lock().options
    }

    /// Returns whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// Returns the consumer-facing state.
    pub fn snapshot(&self) -> ScrollSnapshot<T> {
        self.inner.updates.borrow().clone()
    }

    /// Returns a receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<ScrollSnapshot<T>> {
        self.inner.updates.subscribe()
    }

    /// Performs the implicit first-page load.
    ///
    /// Runs on mount and after the key changes or a refresh. Page 1 is read
    /// through the cache, so an unexpired entry does not hit the fetcher. The
    /// result replaces the accumulated items unless it matches the held
    /// first page, or deeper pages are already merged.
    pub async fn load_initial(&self) -> LoadOutcome {
        let (key, fetcher, epoch, token, options) = {
            let mut control = self.lock();
            if control.disposed || !control.options.enabled {
                return LoadOutcome::Skipped;
            }
            if !control.state.is_seeded() {
                control.state.is_loading = true;
                self.publish(&control);
            }
            (
                control.key.clone(),
                Arc::clone(&control.fetcher),
                control.epoch,
                control.epoch_token.clone(),
                control.options,
            )
        };

        let page_key = key.page(1, options.page_size);
        let fetch = async {
            if !options.refetch_on_mount {
                if let Some(page) = self.inner.cache.get_cached(&page_key).await {
                    return Ok(page);
                }
            }
            let load = Self::page_load(fetcher, 1, options.page_size);
            self.inner
                .cache
                .fetch_or_get(&page_key, load, &options.cache_options())
                .await
        };

        let result = tokio::select! {
            biased;
            () = token.cancelled() => None,
            result = fetch => Some(result),
        };

        let mut control = self.lock();
        let Some(result) = result.filter(|_| control.epoch == epoch) else {
            tracing::debug!(
                target: TRACING_TARGET_LIFECYCLE,
                key = %key,
                "Discarded first page from a previous epoch"
            );
            return LoadOutcome::Discarded;
        };

        control.state.is_loading = false;
        let outcome = self.apply_first_page(&mut control, &key, result);
        self.publish(&control);
        outcome
    }

    fn apply_first_page(
        &self,
        control: &mut Control<T>,
        key: &QueryKey,
        result: Result<PageResult<T>>,
    ) -> LoadOutcome {
        let page_size = control.options.page_size;
        match result {
            Ok(_) if control.state.current_page > 1 => {
                let recovered = control.state.recovered(1);
                tracing::debug!(
                    target: TRACING_TARGET_ENGINE,
                    key = %key,
                    current_page = control.state.current_page,
                    recovered,
                    "Keeping accumulated pages over revalidated first page"
                );
                LoadOutcome::Unchanged
            }
            Ok(page) if control.state.same_first_page(&page) => {
                control.state.recovered(1);
                LoadOutcome::Unchanged
            }
            Ok(page) => {
                control.state.seed(page, page_size);
                let added = control.state.items().len();
                tracing::debug!(
                    target: TRACING_TARGET_ENGINE,
                    key = %key,
                    items = added,
                    has_next_page = control.state.has_next_page,
                    total_count = ?control.state.total_count,
                    "Seeded first page"
                );
                LoadOutcome::Loaded { page: 1, added }
            }
            Err(error) if error.is_range_not_satisfiable() => {
                control.state.has_next_page = false;
                LoadOutcome::Exhausted
            }
            Err(error) => {
                tracing::warn!(
                    target: TRACING_TARGET_ENGINE,
                    key = %key,
                    error = %error,
                    "Failed to load first page"
                );
                control.state.fail(1, error);
                LoadOutcome::Failed
            }
        }
    }

    /// Fetches and merges the next page.
    ///
    /// A no-op unless page 1 is held, `has_next_page` is set and no other
    /// `load_more` is in flight. The page-scoped cache entry is used when
    /// present; otherwise the page is fetched through the cache.
    ///
    /// An out-of-range failure ends paging without an error. Other failures
    /// populate `error` and follow the configured [`PagingFailurePolicy`].
    pub async fn load_more(&self) -> LoadOutcome {
        let (key, fetcher, next, epoch, token, options) = {
            let mut control = self.lock();
            let page_size = control.options.page_size;
            if control.disposed || !control.options.enabled {
                return LoadOutcome::Skipped;
            }

            let state = &control.state;
            if !state.is_seeded() || !state.has_next_page || state.is_loading_more {
                tracing::trace!(
                    target: TRACING_TARGET_ENGINE,
                    seeded = state.is_seeded(),
                    has_next_page = state.has_next_page,
                    is_loading_more = state.is_loading_more,
                    "Skipping load_more"
                );
                return LoadOutcome::Skipped;
            }

            if state.reaches_total(page_size) {
                control.state.has_next_page = false;
                self.publish(&control);
                return LoadOutcome::Exhausted;
            }

            control.state.is_loading_more = true;
            if let Some(previous) = control.load_token.take() {
                previous.cancel();
            }
            let token = control.epoch_token.child_token();
            control.load_token = Some(token.clone());
            self.publish(&control);

            (
                control.key.clone(),
                Arc::clone(&control.fetcher),
                control.state.current_page + 1,
                control.epoch,
                token,
                control.options,
            )
        };

        let page_key = key.page(next, options.page_size);
        let fetch = async {
            if let Some(page) = self.inner.cache.get_cached(&page_key).await {
                tracing::debug!(
                    target: TRACING_TARGET_ENGINE,
                    key = %page_key,
                    "Using cached page"
                );
                return Ok(page);
            }
            let load = Self::page_load(fetcher, next, options.page_size);
            self.inner
                .cache
                .fetch_or_get(&page_key, load, &options.cache_options())
                .await
        };

        let result = tokio::select! {
            biased;
            () = token.cancelled() => None,
            result = fetch => Some(result),
        };

        let mut control = self.lock();
        if control.epoch != epoch {
            tracing::debug!(
                target: TRACING_TARGET_LIFECYCLE,
                key = %page_key,
                "Discarded page from a previous epoch"
            );
            return LoadOutcome::Discarded;
        }

        control.load_token = None;
        control.state.is_loading_more = false;

        let Some(result) = result else {
            tracing::debug!(target: TRACING_TARGET_LIFECYCLE, key = %page_key, "Cancelled load_more");
            self.publish(&control);
            return LoadOutcome::Discarded;
        };

        let outcome = self.apply_next_page(&mut control, &page_key, next, result);
        self.publish(&control);
        outcome
    }

    fn apply_next_page(
        &self,
        control: &mut Control<T>,
        page_key: &QueryKey,
        next: u32,
        result: Result<PageResult<T>>,
    ) -> LoadOutcome {
        let page_size = control.options.page_size;
        match result {
            Ok(_) if next != control.state.current_page + 1 => {
                tracing::debug!(
                    target: TRACING_TARGET_ENGINE,
                    key = %page_key,
                    current_page = control.state.current_page,
                    "Dropped out-of-order page"
                );
                LoadOutcome::Discarded
            }
            Ok(page) => {
                let added = control.state.merge(next, page, page_size);
                tracing::debug!(
                    target: TRACING_TARGET_ENGINE,
                    key = %page_key,
                    added,
                    items = control.state.items().len(),
                    has_next_page = control.state.has_next_page,
                    "Merged page"
                );
                LoadOutcome::Loaded { page: next, added }
            }
            Err(error) if error.is_range_not_satisfiable() => {
                tracing::debug!(
                    target: TRACING_TARGET_ENGINE,
                    key = %page_key,
                    "Page beyond the end, paging stopped"
                );
                control.state.has_next_page = false;
                LoadOutcome::Exhausted
            }
            Err(error) => {
                let policy = control.options.failure_policy;
                tracing::warn!(
                    target: TRACING_TARGET_ENGINE,
                    key = %page_key,
                    error = %error,
                    policy = %policy,
                    "Failed to load page"
                );
                control.state.fail(next, error);
                if policy == PagingFailurePolicy::StopPaging {
                    control.state.has_next_page = false;
                }
                LoadOutcome::Failed
            }
        }
    }

    /// Cancels in-flight loads, invalidates every cached page under the key
    /// and resets to empty.
    ///
    /// Does not fetch; the next [`load_initial`](Self::load_initial)
    /// repopulates page 1.
    pub async fn refresh(&self) {
        let key = {
            let mut control = self.lock();
            if control.disposed {
                return;
            }
            control.advance_epoch();
            control.state.reset();
            self.publish(&control);
            control.key.clone()
        };

        let removed = self
            .inner
            .cache
            .invalidate(&key, InvalidateOptions::prefix())
            .await;
        tracing::debug!(
            target: TRACING_TARGET_LIFECYCLE,
            key = %key,
            removed,
            "Refreshed"
        );
    }

    /// Switches to a new key, dropping everything accumulated for the old one.
    ///
    /// Returns false when the key is unchanged.
    pub fn set_key(&self, key: QueryKey) -> bool {
        let mut control = self.lock();
        if control.disposed || control.key == key {
            return false;
        }

        tracing::debug!(
            target: TRACING_TARGET_LIFECYCLE,
            from = %control.key,
            to = %key,
            "Query key changed"
        );
        control.advance_epoch();
        control.state.reset();
        control.key = key;
        self.publish(&control);
        true
    }

    /// Switches to a new key together with the fetcher that serves it.
    ///
    /// Loads started before the switch keep the old fetcher and are
    /// discarded. Returns false when disposed or when the key is unchanged,
    /// in which case the fetcher is left as is.
    pub fn rebind(&self, key: QueryKey, fetcher: SharedFetcher<T>) -> bool {
        let mut control = self.lock();
        if control.disposed || control.key == key {
            return false;
        }

        tracing::debug!(
            target: TRACING_TARGET_LIFECYCLE,
            from = %control.key,
            to = %key,
            "Query key and fetcher changed"
        );
        control.advance_epoch();
        control.state.reset();
        control.key = key;
        control.fetcher = fetcher;
        self.publish(&control);
        true
    }

    /// Enables or disables fetching.
    pub fn set_enabled(&self, enabled: bool) {
        self.lock().options.enabled = enabled;
    }

    /// Revalidates page 1 when `refetch_on_window_focus` is set.
    pub async fn on_window_focus(&self) -> LoadOutcome {
        if !self.lock().options.refetch_on_window_focus {
            return LoadOutcome::Skipped;
        }
        self.load_initial().await
    }

    /// Tears the engine down. In-flight loads are cancelled and every later
    /// call is a no-op.
    pub fn dispose(&self) {
        let mut control = self.lock();
        if control.disposed {
            return;
        }
        control.disposed = true;
        control.advance_epoch();
        control.state.is_loading = false;
        control.state.is_loading_more = false;
        self.publish(&control);
        tracing::debug!(target: TRACING_TARGET_LIFECYCLE, key = %control.key, "Disposed");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
    use std::time::Duration;

    use pagewise_cache::{CacheOptions, MemoryCache, QueryCache};
    use pagewise_core::Error;
    use tokio::sync::Notify;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: u32,
    }

    impl Identified for Row {
        type Id = u32;

        fn id(&self) -> u32 {
            self.id
        }
    }

    fn rows(ids: impl IntoIterator<Item = u32>) -> Vec<Row> {
        ids.into_iter().map(|id| Row { id }).collect()
    }

    fn full_page(page: u32, size: u32) -> Vec<Row> {
        rows((page - 1) * size + 1..=page * size)
    }

    fn scripted<F>(calls: &Arc<AtomicUsize>, script: F) -> SharedFetcher<Row>
    where
        F: Fn(u32) -> Result<PageResult<Row>> + Send + Sync + 'static,
    {
        let calls = Arc::clone(calls);
        Arc::new(move |page: u32, _size: u32| {
            calls.fetch_add(1, Ordering::SeqCst);
            let result = script(page);
            async move { result }
        })
    }

    /// Fetcher whose pages after the first wait for `gate`.
    fn gated(calls: &Arc<AtomicUsize>, gate: &Arc<Notify>) -> SharedFetcher<Row> {
        let calls = Arc::clone(calls);
        let gate = Arc::clone(gate);
        Arc::new(move |page: u32, size: u32| {
            calls.fetch_add(1, Ordering::SeqCst);
            let gate = Arc::clone(&gate);
            async move {
                if page > 1 {
                    gate.notified().await;
                }
                Ok::<_, Error>(PageResult::new(full_page(page, size)))
            }
        })
    }

    /// Fetcher whose page 1 waits for `first` once `armed`, and whose later
    /// pages wait for `more`.
    fn racing(
        calls: &Arc<AtomicUsize>,
        armed: &Arc<AtomicBool>,
        first: &Arc<Notify>,
        more: &Arc<Notify>,
    ) -> SharedFetcher<Row> {
        let calls = Arc::clone(calls);
        let armed = Arc::clone(armed);
        let first = Arc::clone(first);
        let more = Arc::clone(more);
        Arc::new(move |page: u32, size: u32| {
            calls.fetch_add(1, Ordering::SeqCst);
            let wait = match page {
                1 if armed.load(Ordering::SeqCst) => Some(Arc::clone(&first)),
                1 => None,
                _ => Some(Arc::clone(&more)),
            };
            async move {
                if let Some(gate) = wait {
                    gate.notified().await;
                }
                Ok::<_, Error>(PageResult::new(full_page(page, size)))
            }
        })
    }

    fn memory_cache() -> SharedCache<Row> {
        Arc::new(MemoryCache::new())
    }

    fn key() -> QueryKey {
        QueryKey::new("orders").with("tenant-a")
    }

    fn ids(snapshot: &ScrollSnapshot<Row>) -> Vec<u32> {
        snapshot.data.iter().map(|row| row.id).collect()
    }

    #[tokio::test]
    async fn idempotent_first_page() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = scripted(&calls, |page| Ok(PageResult::new(full_page(page, 20))));
        let cache = memory_cache();
        let options = ScrollOptions::default().with_stale_time(Duration::from_secs(60));

        let first = InfiniteScroll::new(key(), Arc::clone(&fetcher), Arc::clone(&cache), options);
        let second = InfiniteScroll::new(key(), fetcher, cache, options);

        first.load_initial().await;
        second.load_initial().await;

        assert_eq!(ids(&first.snapshot()), ids(&second.snapshot()));
        assert_eq!(first.snapshot().len(), 20);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeated_initial_load_leaves_state_untouched() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = scripted(&calls, |page| Ok(PageResult::new(full_page(page, 20))));
        let scroll = InfiniteScroll::new(key(), fetcher, memory_cache(), ScrollOptions::default());

        assert_eq!(
            scroll.load_initial().await,
            LoadOutcome::Loaded { page: 1, added: 20 }
        );
        assert_eq!(scroll.load_initial().await, LoadOutcome::Unchanged);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn merges_are_deduplicated() {
        let calls = Arc::new(AtomicUsize::new(0));
        // Each page overlaps the previous one by five rows.
        let fetcher = scripted(&calls, |page| {
            let start = (page - 1) * 15 + 1;
            Ok(PageResult::new(rows(start..start + 20)))
        });
        let scroll = InfiniteScroll::new(key(), fetcher, memory_cache(), ScrollOptions::default());

        scroll.load_initial().await;
        for _ in 0..3 {
            scroll.load_more().await;
        }

        let snapshot = scroll.snapshot();
        let unique: HashSet<u32> = ids(&snapshot).into_iter().collect();
        assert_eq!(unique.len(), snapshot.len());
        assert_eq!(snapshot.len(), 65);
        assert_eq!(snapshot.current_page, 4);
    }

    #[tokio::test]
    async fn paging_is_monotonic() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = scripted(&calls, |page| match page {
            3 => Err(Error::network_error().with_message("reset")),
            _ => Ok(PageResult::new(full_page(page, 20))),
        });
        let options = ScrollOptions::default().with_failure_policy(PagingFailurePolicy::AllowRetry);
        let scroll = InfiniteScroll::new(key(), fetcher, memory_cache(), options);

        scroll.load_initial().await;
        let mut last = scroll.snapshot().current_page;
        for _ in 0..5 {
            scroll.load_more().await;
            let current = scroll.snapshot().current_page;
            assert!(current >= last);
            last = current;
        }
        assert_eq!(last, 2);
    }

    #[tokio::test]
    async fn exhaustion_stops_paging() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = scripted(&calls, |page| match page {
            1 => Ok(PageResult::new(full_page(1, 20))),
            _ => Ok(PageResult::new(rows(21..=25))),
        });
        let scroll = InfiniteScroll::new(key(), fetcher, memory_cache(), ScrollOptions::default());

        scroll.load_initial().await;
        scroll.load_more().await;
        let before = scroll.snapshot();
        assert!(!before.has_next_page);

        assert_eq!(scroll.load_more().await, LoadOutcome::Skipped);
        assert_eq!(scroll.load_more().await, LoadOutcome::Skipped);

        let after = scroll.snapshot();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(ids(&before), ids(&after));
        assert_eq!(before.current_page, after.current_page);
    }

    #[tokio::test]
    async fn refresh_clears_and_reseeds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let version = Arc::new(AtomicU32::new(0));
        let fetcher = {
            let version = Arc::clone(&version);
            scripted(&calls, move |page| {
                let offset = version.load(Ordering::SeqCst) * 1000;
                let items = full_page(page, 20)
                    .into_iter()
                    .map(|row| Row { id: row.id + offset })
                    .collect();
                Ok(PageResult::new(items))
            })
        };
        let cache = memory_cache();
        let options = ScrollOptions::default().with_stale_time(Duration::from_secs(60));
        let scroll = InfiniteScroll::new(key(), fetcher, Arc::clone(&cache), options);

        scroll.load_initial().await;
        scroll.load_more().await;
        assert_eq!(scroll.snapshot().len(), 40);

        version.store(1, Ordering::SeqCst);
        scroll.refresh().await;

        let cleared = scroll.snapshot();
        assert!(cleared.is_empty());
        assert_eq!(cleared.current_page, 0);
        assert!(cleared.has_next_page);
        assert!(cache.get_cached(&key().page(2, 20)).await.is_none());

        scroll.load_initial().await;
        let reseeded = scroll.snapshot();
        assert_eq!(ids(&reseeded), (1001..=1020).collect::<Vec<_>>());
        assert_eq!(reseeded.current_page, 1);
    }

    #[tokio::test]
    async fn concurrent_load_more_advances_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let scroll = InfiniteScroll::new(
            key(),
            gated(&calls, &gate),
            memory_cache(),
            ScrollOptions::default(),
        );
        scroll.load_initial().await;

        let release = async {
            tokio::task::yield_now().await;
            gate.notify_one();
        };
        let (first, second, ()) = tokio::join!(scroll.load_more(), scroll.load_more(), release);

        assert_eq!(first, LoadOutcome::Loaded { page: 2, added: 20 });
        assert_eq!(second, LoadOutcome::Skipped);
        assert_eq!(scroll.snapshot().current_page, 2);
        assert_eq!(scroll.snapshot().len(), 40);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn loading_more_flag_tracks_flight() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let scroll = InfiniteScroll::new(
            key(),
            gated(&calls, &gate),
            memory_cache(),
            ScrollOptions::default(),
        );
        scroll.load_initial().await;

        let observe = async {
            tokio::task::yield_now().await;
            let during = scroll.snapshot().is_loading_more;
            gate.notify_one();
            during
        };
        let (_, during) = tokio::join!(scroll.load_more(), observe);

        assert!(during);
        assert!(!scroll.snapshot().is_loading_more);
    }

    #[tokio::test]
    async fn refresh_discards_in_flight_page() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let scroll = InfiniteScroll::new(
            key(),
            gated(&calls, &gate),
            memory_cache(),
            ScrollOptions::default(),
        );
        scroll.load_initial().await;

        let refresh = async {
            tokio::task::yield_now().await;
            scroll.refresh().await;
        };
        let (outcome, ()) = tokio::join!(scroll.load_more(), refresh);

        assert_eq!(outcome, LoadOutcome::Discarded);
        let snapshot = scroll.snapshot();
        assert!(snapshot.is_empty());
        assert!(!snapshot.is_loading_more);
        assert_eq!(snapshot.current_page, 0);
    }

    #[tokio::test]
    async fn two_pages_then_short_page() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = scripted(&calls, |page| match page {
            1 => Ok(PageResult::new(full_page(1, 20)).with_has_next_page(true)),
            _ => Ok(PageResult::new(rows(21..=25))),
        });
        let scroll = InfiniteScroll::new(key(), fetcher, memory_cache(), ScrollOptions::default());

        scroll.load_initial().await;
        scroll.load_more().await;

        let snapshot = scroll.snapshot();
        assert_eq!(snapshot.len(), 25);
        assert!(!snapshot.has_next_page);
    }

    #[tokio::test]
    async fn out_of_range_page_is_not_an_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = scripted(&calls, |page| match page {
            3 => Err(Error::range_not_satisfiable()),
            _ => Ok(PageResult::new(full_page(page, 20))),
        });
        let scroll = InfiniteScroll::new(key(), fetcher, memory_cache(), ScrollOptions::default());

        scroll.load_initial().await;
        scroll.load_more().await;
        let before = ids(&scroll.snapshot());

        assert_eq!(scroll.load_more().await, LoadOutcome::Exhausted);
        let snapshot = scroll.snapshot();
        assert!(!snapshot.has_next_page);
        assert!(snapshot.error.is_none());
        assert_eq!(ids(&snapshot), before);
    }

    #[tokio::test]
    async fn known_total_prevents_trailing_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = scripted(&calls, |page| {
            let items = match page {
                3 => rows(41..=45),
                _ => full_page(page, 20),
            };
            Ok(PageResult::new(items).with_total_count(45))
        });
        let scroll = InfiniteScroll::new(key(), fetcher, memory_cache(), ScrollOptions::default());

        scroll.load_initial().await;
        scroll.load_more().await;
        assert_eq!(scroll.snapshot().current_page, 2);
        assert_eq!(scroll.snapshot().len(), 40);

        assert_eq!(
            scroll.load_more().await,
            LoadOutcome::Loaded { page: 3, added: 5 }
        );
        assert_eq!(scroll.load_more().await, LoadOutcome::Skipped);

        let snapshot = scroll.snapshot();
        assert_eq!(snapshot.len(), 45);
        assert_eq!(snapshot.total_count, Some(45));
        assert!(!snapshot.has_next_page);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failure_stops_paging_and_keeps_items() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = scripted(&calls, |page| match page {
            2 => Err(Error::backend().with_message("connection refused")),
            _ => Ok(PageResult::new(full_page(page, 20))),
        });
        let scroll = InfiniteScroll::new(key(), fetcher, memory_cache(), ScrollOptions::default());

        scroll.load_initial().await;
        assert_eq!(scroll.load_more().await, LoadOutcome::Failed);

        let snapshot = scroll.snapshot();
        assert_eq!(snapshot.len(), 20);
        assert!(snapshot.has_error());
        assert!(!snapshot.has_next_page);
        assert!(!snapshot.is_loading_more);
        assert_eq!(scroll.load_more().await, LoadOutcome::Skipped);
    }

    #[tokio::test]
    async fn allow_retry_keeps_paging_open() {
        let calls = Arc::new(AtomicUsize::new(0));
        let attempts = Arc::new(AtomicUsize::new(0));
        let fetcher = {
            let attempts = Arc::clone(&attempts);
            scripted(&calls, move |page| {
                if page == 2 && attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(Error::timeout());
                }
                Ok(PageResult::new(full_page(page, 20)))
            })
        };
        let options = ScrollOptions::default().with_failure_policy(PagingFailurePolicy::AllowRetry);
        let scroll = InfiniteScroll::new(key(), fetcher, memory_cache(), options);

        scroll.load_initial().await;
        assert_eq!(scroll.load_more().await, LoadOutcome::Failed);
        assert!(scroll.snapshot().has_next_page);
        assert!(scroll.snapshot().has_error());

        assert_eq!(
            scroll.load_more().await,
            LoadOutcome::Loaded { page: 2, added: 20 }
        );
        assert!(!scroll.snapshot().has_error());
    }

    #[tokio::test]
    async fn failed_initial_load_shows_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = scripted(&calls, |_| Err(Error::backend()));
        let scroll = InfiniteScroll::new(key(), fetcher, memory_cache(), ScrollOptions::default());

        assert_eq!(scroll.load_initial().await, LoadOutcome::Failed);
        let snapshot = scroll.snapshot();
        assert!(snapshot.is_empty());
        assert!(snapshot.has_error());
        assert!(!snapshot.is_loading);
    }

    #[tokio::test]
    async fn load_more_before_first_page_is_noop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = scripted(&calls, |page| Ok(PageResult::new(full_page(page, 20))));
        let scroll = InfiniteScroll::new(key(), fetcher, memory_cache(), ScrollOptions::default());

        assert_eq!(scroll.load_more().await, LoadOutcome::Skipped);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cached_next_page_skips_fetcher() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = scripted(&calls, |page| Ok(PageResult::new(full_page(page, 20))));
        let cache = memory_cache();
        cache
            .set_cached(
                &key().page(2, 20),
                PageResult::new(rows(500..520)),
                &CacheOptions::default(),
            )
            .await;
        let scroll = InfiniteScroll::new(key(), fetcher, cache, ScrollOptions::default());

        scroll.load_initial().await;
        scroll.load_more().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(scroll.snapshot().data[20], Row { id: 500 });
    }

    #[tokio::test]
    async fn disabled_engine_does_not_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = scripted(&calls, |page| Ok(PageResult::new(full_page(page, 20))));
        let options = ScrollOptions::default().with_enabled(false);
        let scroll = InfiniteScroll::new(key(), fetcher, memory_cache(), options);

        assert_eq!(scroll.load_initial().await, LoadOutcome::Skipped);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        scroll.set_enabled(true);
        scroll.load_initial().await;
        assert_eq!(scroll.snapshot().len(), 20);
    }

    #[tokio::test]
    async fn key_change_resets_state() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = scripted(&calls, |page| Ok(PageResult::new(full_page(page, 20))));
        let scroll = InfiniteScroll::new(key(), fetcher, memory_cache(), ScrollOptions::default());

        scroll.load_initial().await;
        scroll.load_more().await;
        assert!(!scroll.set_key(key()));

        let next = QueryKey::new("orders").with("tenant-b");
        assert!(scroll.set_key(next.clone()));
        assert!(scroll.snapshot().is_empty());
        assert_eq!(scroll.key(), next);

        scroll.load_initial().await;
        assert_eq!(scroll.snapshot().current_page, 1);
    }

    #[tokio::test]
    async fn rebind_switches_fetcher_with_key() {
        let old_calls = Arc::new(AtomicUsize::new(0));
        let new_calls = Arc::new(AtomicUsize::new(0));
        let old = scripted(&old_calls, |page| Ok(PageResult::new(full_page(page, 20))));
        let new = scripted(&new_calls, |_| Ok(PageResult::new(rows([500, 501]))));
        let scroll = InfiniteScroll::new(key(), old, memory_cache(), ScrollOptions::default());
        scroll.load_initial().await;

        assert!(!scroll.rebind(key(), Arc::clone(&new)));
        let next = QueryKey::new("orders").with("tenant-b");
        assert!(scroll.rebind(next, new));
        scroll.load_initial().await;

        let snapshot = scroll.snapshot();
        assert_eq!(snapshot.data, rows([500, 501]));
        assert!(!snapshot.has_next_page);
        assert_eq!(old_calls.load(Ordering::SeqCst), 1);
        assert_eq!(new_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dispose_cancels_in_flight_load() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let scroll = InfiniteScroll::new(
            key(),
            gated(&calls, &gate),
            memory_cache(),
            ScrollOptions::default(),
        );
        scroll.load_initial().await;

        let dispose = async {
            tokio::task::yield_now().await;
            scroll.dispose();
        };
        let (outcome, ()) = tokio::join!(scroll.load_more(), dispose);

        assert_eq!(outcome, LoadOutcome::Discarded);
        assert!(scroll.is_disposed());
        assert_eq!(scroll.snapshot().len(), 20);
        assert_eq!(scroll.load_more().await, LoadOutcome::Skipped);
        assert_eq!(scroll.load_initial().await, LoadOutcome::Skipped);
    }

    #[tokio::test]
    async fn window_focus_respects_option() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = scripted(&calls, |page| Ok(PageResult::new(full_page(page, 20))));
        let scroll = InfiniteScroll::new(
            key(),
            Arc::clone(&fetcher),
            memory_cache(),
            ScrollOptions::default(),
        );
        scroll.load_initial().await;
        assert_eq!(scroll.on_window_focus().await, LoadOutcome::Skipped);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let options = ScrollOptions::default().with_refetch_on_window_focus(true);
        let focused = InfiniteScroll::new(key(), fetcher, memory_cache(), options);
        focused.load_initial().await;
        assert_eq!(focused.on_window_focus().await, LoadOutcome::Unchanged);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn mount_without_refetch_uses_cached_page() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = scripted(&calls, |page| Ok(PageResult::new(full_page(page, 20))));
        let cache = memory_cache();
        cache
            .set_cached(
                &key().page(1, 20),
                PageResult::new(rows(1..=3)),
                &CacheOptions::default(),
            )
            .await;
        let options = ScrollOptions::default().with_refetch_on_mount(false);
        let scroll = InfiniteScroll::new(key(), fetcher, cache, options);

        scroll.load_initial().await;
        assert_eq!(scroll.snapshot().len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn subscribers_observe_changes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = scripted(&calls, |page| Ok(PageResult::new(full_page(page, 20))));
        let scroll = InfiniteScroll::new(key(), fetcher, memory_cache(), ScrollOptions::default());
        let mut updates = scroll.subscribe();

        scroll.load_initial().await;
        assert!(updates.has_changed().unwrap());
        assert_eq!(updates.borrow_and_update().len(), 20);
    }

    #[tokio::test]
    async fn weak_handle_does_not_keep_engine_alive() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = scripted(&calls, |page| Ok(PageResult::new(full_page(page, 20))));
        let scroll = InfiniteScroll::new(key(), fetcher, memory_cache(), ScrollOptions::default());
        let weak = scroll.downgrade();

        assert!(weak.upgrade().is_some());
        drop(scroll);
        assert!(weak.upgrade().is_none());
    }

    #[tokio::test]
    async fn successful_first_page_clears_its_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let failing = Arc::new(AtomicBool::new(false));
        let fetcher = {
            let failing = Arc::clone(&failing);
            scripted(&calls, move |page| {
                if page == 1 && failing.load(Ordering::SeqCst) {
                    Err(Error::network_error().with_message("offline"))
                } else {
                    Ok(PageResult::new(full_page(page, 20)))
                }
            })
        };
        let options = ScrollOptions::default().with_refetch_on_window_focus(true);
        let scroll = InfiniteScroll::new(key(), fetcher, memory_cache(), options);
        scroll.load_initial().await;

        failing.store(true, Ordering::SeqCst);
        assert_eq!(scroll.on_window_focus().await, LoadOutcome::Failed);
        assert!(scroll.snapshot().has_error());
        assert_eq!(scroll.snapshot().len(), 20);

        failing.store(false, Ordering::SeqCst);
        assert_eq!(scroll.on_window_focus().await, LoadOutcome::Unchanged);
        assert!(scroll.snapshot().error.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // Same again with deeper pages held.
        scroll.load_more().await;
        failing.store(true, Ordering::SeqCst);
        assert_eq!(scroll.on_window_focus().await, LoadOutcome::Failed);
        failing.store(false, Ordering::SeqCst);
        assert_eq!(scroll.on_window_focus().await, LoadOutcome::Unchanged);

        let snapshot = scroll.snapshot();
        assert!(snapshot.error.is_none());
        assert_eq!(snapshot.current_page, 2);
        assert_eq!(snapshot.len(), 40);
    }

    #[tokio::test]
    async fn first_page_failure_survives_other_page_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let failing = Arc::new(AtomicBool::new(false));
        let fetcher = {
            let failing = Arc::clone(&failing);
            scripted(&calls, move |page| {
                if page == 1 && failing.load(Ordering::SeqCst) {
                    Err(Error::network_error())
                } else {
                    Ok(PageResult::new(full_page(page, 20)))
                }
            })
        };
        let options = ScrollOptions::default().with_refetch_on_window_focus(true);
        let scroll = InfiniteScroll::new(key(), fetcher, memory_cache(), options);
        scroll.load_initial().await;

        failing.store(true, Ordering::SeqCst);
        scroll.on_window_focus().await;
        scroll.load_more().await;

        let snapshot = scroll.snapshot();
        assert_eq!(snapshot.current_page, 2);
        assert!(snapshot.has_error());
    }

    async fn race_first_page_with_next(page_two_first: bool) {
        let calls = Arc::new(AtomicUsize::new(0));
        let armed = Arc::new(AtomicBool::new(false));
        let first = Arc::new(Notify::new());
        let more = Arc::new(Notify::new());
        let scroll = InfiniteScroll::new(
            key(),
            racing(&calls, &armed, &first, &more),
            memory_cache(),
            ScrollOptions::default(),
        );
        scroll.load_initial().await;
        armed.store(true, Ordering::SeqCst);

        let mut pages = vec![scroll.snapshot().current_page];
        let drive = async {
            let order = if page_two_first {
                [&more, &first]
            } else {
                [&first, &more]
            };
            for gate in order {
                for _ in 0..4 {
                    tokio::task::yield_now().await;
                }
                gate.notify_one();
                for _ in 0..4 {
                    tokio::task::yield_now().await;
                }
                pages.push(scroll.snapshot().current_page);
            }
        };
        let (initial, more_outcome, ()) =
            tokio::join!(scroll.load_initial(), scroll.load_more(), drive);
        pages.push(scroll.snapshot().current_page);

        assert_eq!(initial, LoadOutcome::Unchanged);
        assert_eq!(more_outcome, LoadOutcome::Loaded { page: 2, added: 20 });
        assert!(pages.windows(2).all(|pair| pair[0] <= pair[1]), "{pages:?}");

        let snapshot = scroll.snapshot();
        let unique: HashSet<u32> = ids(&snapshot).into_iter().collect();
        assert_eq!(snapshot.current_page, 2);
        assert_eq!(snapshot.len(), 40);
        assert_eq!(unique.len(), 40);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn first_page_racing_next_page_resolving_last() {
        race_first_page_with_next(true).await;
    }

    #[tokio::test]
    async fn first_page_racing_next_page_resolving_first() {
        race_first_page_with_next(false).await;
    }
}
