//! Page fetcher for one resource, filter and tenant.

use std::marker::PhantomData;

use pagewise_core::{PageFetcher, PageResult, PageWindow, Result, TenantContext};
use pagewise_store::{CountMode, Filter, ListQuery, SharedStore};
use serde::de::DeserializeOwned;

use crate::{ListFilter, ListResource, TRACING_TARGET_FETCH};

/// Reads pages of a resource from a row store.
///
/// Every query is scoped to the tenant. While the tenant is unresolved the
/// fetcher returns an empty, terminal page instead of querying without the
/// scope.
pub struct ResourceFetcher<T> {
    store: SharedStore,
    resource: ListResource,
    filter: ListFilter,
    tenant: TenantContext,
    _item: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for ResourceFetcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceFetcher")
            .field("resource", &self.resource.name)
            .field("filter", &self.filter)
            .field("tenant", &self.tenant)
            .finish_non_exhaustive()
    }
}

impl<T> ResourceFetcher<T> {
    pub fn new(
        store: SharedStore,
        resource: ListResource,
        filter: ListFilter,
        tenant: TenantContext,
    ) -> Self {
        Self {
            store,
            resource,
            filter,
            tenant,
            _item: PhantomData,
        }
    }

    /// Builds the query for one page, or `None` while the tenant is unknown.
    pub fn query(&self, window: PageWindow) -> Option<ListQuery> {
        let tenant = self.tenant.tenant_id()?;
        let query = ListQuery::new(self.resource.table)
            .select(self.resource.select)
            .filter(Filter::eq(self.resource.tenant_column, tenant.to_string()))
            .filters(self.filter.predicates(&self.resource))
            .order(self.filter.sort_for(&self.resource))
            .window(window)
            .count(CountMode::Exact);
        Some(query)
    }
}

#[async_trait::async_trait]
impl<T> PageFetcher<T> for ResourceFetcher<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<PageResult<T>> {
        let window = PageWindow::new(page, page_size);
        let Some(query) = self.query(window) else {
            tracing::debug!(
                target: TRACING_TARGET_FETCH,
                resource = self.resource.name,
                tenant = ?self.tenant,
                "Tenant unresolved, returning empty page"
            );
            return Ok(PageResult::empty());
        };

        let rows = self
            .store
            .select(&query)
            .await
            .map_err(|error| error.with_context(self.resource.name))?;
        let total = rows.total;
        let mut result = rows.decode::<T>()?;
        if let Some(total) = total {
            result.has_next_page = Some(window.has_more(total));
        }

        tracing::debug!(
            target: TRACING_TARGET_FETCH,
            resource = self.resource.name,
            page,
            items = result.len(),
            total = ?total,
            "Fetched page"
        );
        Ok(result)
    }
}
