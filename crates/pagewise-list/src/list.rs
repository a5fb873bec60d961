//! Infinite-scroll list bound to one resource, filter and tenant.

use std::sync::Arc;

use pagewise_cache::SharedCache;
use pagewise_core::{Identified, QueryKey, Result, SharedFetcher, TenantContext};
use pagewise_engine::{InfiniteScroll, LoadOutcome, ScrollOptions, ScrollSnapshot};
use pagewise_realtime::{ChannelFilter, Invalidator, SharedFeed};
use pagewise_store::SharedStore;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, watch};

use crate::{ListFilter, ListResource, ResourceFetcher, TRACING_TARGET_LIST};

/// Returns the query key of `resource` under `filter` and `tenant`.
pub fn list_key(
    resource: &ListResource,
    filter: &ListFilter,
    tenant: TenantContext,
) -> Result<QueryKey> {
    Ok(QueryKey::new(resource.name).with_json(filter)?.with(tenant))
}

/// Filter and tenant currently bound, plus the change listener for them.
struct Binding {
    filter: ListFilter,
    tenant: TenantContext,
    invalidator: Option<Invalidator>,
}

/// One half of the binding replaced by a setter.
enum Rebind {
    Filter(ListFilter),
    Tenant(TenantContext),
}

/// Builder for [`EntityList`].
pub struct EntityListBuilder<T: Identified> {
    resource: ListResource,
    store: SharedStore,
    cache: SharedCache<T>,
    feed: Option<SharedFeed>,
    options: ScrollOptions,
    filter: ListFilter,
    tenant: TenantContext,
}

impl<T> EntityListBuilder<T>
where
    T: DeserializeOwned + Identified + Clone + Send + Sync + 'static,
{
    /// Subscribes to changes of the resource's table through `feed`.
    #[must_use]
    pub fn with_feed(mut self, feed: SharedFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ScrollOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: ListFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_tenant(mut self, tenant: impl Into<TenantContext>) -> Self {
        self.tenant = tenant.into();
        self
    }

    /// Creates the list and acquires its change subscription.
    ///
    /// Nothing is fetched until [`EntityList::load_initial`] runs.
    pub async fn build(self) -> Result<EntityList<T>> {
        let key = list_key(&self.resource, &self.filter, self.tenant)?;
        let fetcher = fetcher(&self.store, self.resource, &self.filter, self.tenant);
        let engine = InfiniteScroll::new(key, fetcher, self.cache, self.options);

        let list = EntityList {
            resource: self.resource,
            store: self.store,
            feed: self.feed,
            engine,
            binding: Mutex::new(Binding {
                filter: self.filter,
                tenant: self.tenant,
                invalidator: None,
            }),
        };

        {
            let mut binding = list.binding.lock().await;
            binding.invalidator = list.acquire(binding.tenant).await?;
        }
        Ok(list)
    }
}

fn fetcher<T>(
    store: &SharedStore,
    resource: ListResource,
    filter: &ListFilter,
    tenant: TenantContext,
) -> SharedFetcher<T>
where
    T: DeserializeOwned + Send + 'static,
{
    Arc::new(ResourceFetcher::new(
        Arc::clone(store),
        resource,
        filter.clone(),
        tenant,
    ))
}

/// One list screen: an [`InfiniteScroll`] over a resource, scoped to a
/// tenant, refreshed whenever the resource's table changes.
///
/// The change subscription follows the binding. It is acquired when the list
/// is built with a resolved tenant, released before a new filter or tenant is
/// bound and re-acquired afterwards, and released on [`dispose`] or drop.
///
/// [`dispose`]: Self::dispose
pub struct EntityList<T: Identified> {
    resource: ListResource,
    store: SharedStore,
    feed: Option<SharedFeed>,
    engine: InfiniteScroll<T>,
    binding: Mutex<Binding>,
}

impl<T: Identified> std::fmt::Debug for EntityList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityList")
            .field("resource", &self.resource.name)
            .field("realtime", &self.feed.is_some())
            .finish_non_exhaustive()
    }
}

impl<T> EntityList<T>
where
    T: DeserializeOwned + Identified + Clone + Send + Sync + 'static,
{
    /// Starts building a list of `resource`.
    pub fn builder(
        resource: ListResource,
        store: SharedStore,
        cache: SharedCache<T>,
    ) -> EntityListBuilder<T> {
        EntityListBuilder {
            resource,
            store,
            cache,
            feed: None,
            options: ScrollOptions::default(),
            filter: ListFilter::default(),
            tenant: TenantContext::default(),
        }
    }

    /// Subscribes to the table for `tenant`, refreshing the engine on every
    /// change. Returns `None` without a feed or a resolved tenant.
    async fn acquire(&self, tenant: TenantContext) -> Result<Option<Invalidator>> {
        let (Some(feed), Some(tenant_id)) = (&self.feed, tenant.tenant_id()) else {
            return Ok(None);
        };

        let filter = ChannelFilter::new(self.resource.table).with_tenant(tenant_id);
        let subscription = feed.subscribe(filter).await?;
        tracing::debug!(
            target: TRACING_TARGET_LIST,
            resource = self.resource.name,
            channel = %subscription.filter().channel_name(),
            "Acquired change subscription"
        );

        let engine = self.engine.downgrade();
        let invalidator = Invalidator::spawn(subscription, move |_event| {
            let engine = engine.clone();
            async move {
                if let Some(engine) = engine.upgrade() {
                    engine.refresh().await;
                    engine.load_initial().await;
                }
            }
        });
        Ok(Some(invalidator))
    }

    /// Applies `change` to the binding under one lock acquisition.
    ///
    /// When the key changes, the old subscription is released before the
    /// engine is rebound and a new one is acquired. When the key is unchanged
    /// but an earlier acquisition failed, only the subscription is retried.
    /// Returns false when nothing had to be done.
    async fn rebind(&self, change: Rebind) -> Result<bool> {
        let mut binding = self.binding.lock().await;
        if self.engine.is_disposed() {
            return Ok(false);
        }

        let (filter, tenant) = match change {
            Rebind::Filter(filter) => (filter, binding.tenant),
            Rebind::Tenant(tenant) => (binding.filter.clone(), tenant),
        };
        let key = list_key(&self.resource, &filter, tenant)?;

        if key != self.engine.key() {
            if let Some(previous) = binding.invalidator.take() {
                tracing::debug!(
                    target: TRACING_TARGET_LIST,
                    resource = self.resource.name,
                    channel = %previous.filter().channel_name(),
                    "Released change subscription"
                );
                previous.release();
            }

            let fetcher = fetcher(&self.store, self.resource, &filter, tenant);
            self.engine.rebind(key, fetcher);
            binding.filter = filter;
            binding.tenant = tenant;
        } else if binding.invalidator.is_some() || !self.wants_subscription(tenant) {
            return Ok(false);
        } else {
            tracing::debug!(
                target: TRACING_TARGET_LIST,
                resource = self.resource.name,
                "Retrying change subscription"
            );
        }

        binding.invalidator = self.acquire(tenant).await?;
        Ok(true)
    }

    fn wants_subscription(&self, tenant: TenantContext) -> bool {
        self.feed.is_some() && tenant.is_resolved()
    }

    /// Returns the resource this list reads.
    pub fn resource(&self) -> &ListResource {
        &self.resource
    }

    /// Returns the underlying engine.
    pub fn engine(&self) -> &InfiniteScroll<T> {
        &self.engine
    }

    /// Returns the current query key.
    pub fn key(&self) -> QueryKey {
        self.engine.key()
    }

    /// Returns the bound filter.
    pub async fn filter(&self) -> ListFilter {
        self.binding.lock().await.filter.clone()
    }

    /// Returns the bound tenant.
    pub async fn tenant(&self) -> TenantContext {
        self.binding.lock().await.tenant
    }

    /// Returns whether a change subscription is held.
    pub async fn is_subscribed(&self) -> bool {
        self.binding
            .lock()
            .await
            .invalidator
            .as_ref()
            .is_some_and(Invalidator::is_active)
    }

    pub fn snapshot(&self) -> ScrollSnapshot<T> {
        self.engine.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScrollSnapshot<T>> {
        self.engine.subscribe()
    }

    pub async fn load_initial(&self) -> LoadOutcome {
        self.engine.load_initial().await
    }

    pub async fn load_more(&self) -> LoadOutcome {
        self.engine.load_more().await
    }

    pub async fn refresh(&self) {
        self.engine.refresh().await;
    }

    /// Applies a new filter. The accumulated list is dropped; call
    /// [`load_initial`](Self::load_initial) to fetch the first page.
    ///
    /// If subscribing fails, the filter stays applied and calling again with
    /// the same filter retries the subscription.
    pub async fn set_filter(&self, filter: ListFilter) -> Result<bool> {
        self.rebind(Rebind::Filter(filter)).await
    }

    /// Applies a new tenant, e.g. once the profile lookup resolves.
    pub async fn set_tenant(&self, tenant: impl Into<TenantContext>) -> Result<bool> {
        self.rebind(Rebind::Tenant(tenant.into())).await
    }

    /// Cancels in-flight loads and releases the change subscription.
    pub async fn dispose(&self) {
        self.engine.dispose();
        let released = self.binding.lock().await.invalidator.take();
        if let Some(invalidator) = released {
            invalidator.release();
        }
        tracing::debug!(
            target: TRACING_TARGET_LIST,
            resource = self.resource.name,
            "Disposed list"
        );
    }
}
