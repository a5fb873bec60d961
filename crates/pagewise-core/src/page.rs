//! Page results and the fetcher contract supplied by every list.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Result;

/// The payload of one bounded page fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<T> {
    /// Items of this page, in store order.
    #[serde(alias = "data")]
    pub items: Vec<T>,
    /// Total number of items matching the query, when the store reported it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    /// Explicit continuation flag, when the fetcher knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_next_page: Option<bool>,
}

impl<T> PageResult<T> {
    /// Creates a page holding `items` with no count or continuation flag.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            total_count: None,
            has_next_page: None,
        }
    }

    /// Creates the empty, terminal page returned when a query cannot run yet.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_count: None,
            has_next_page: Some(false),
        }
    }

    /// Attaches the total count.
    #[must_use]
    pub fn with_total_count(mut self, total_count: u64) -> Self {
        self.total_count = Some(total_count);
        self
    }

    /// Attaches an explicit continuation flag.
    #[must_use]
    pub fn with_has_next_page(mut self, has_next_page: bool) -> Self {
        self.has_next_page = Some(has_next_page);
        self
    }

    /// Returns whether another page may follow this one.
    ///
    /// Uses the explicit flag when present, otherwise assumes more data only
    /// when this page came back full.
    pub fn continues(&self, page_size: u32) -> bool {
        self.has_next_page
            .unwrap_or(self.items.len() == page_size as usize)
    }

    /// Returns the number of items in this page.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns whether this page has no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maps the items to a different type.
    pub fn map<U, F>(self, f: F) -> PageResult<U>
    where
        F: FnMut(T) -> U,
    {
        PageResult {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            has_next_page: self.has_next_page,
        }
    }
}

impl<T> Default for PageResult<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Performs one bounded query for `(page, page_size)` against the store.
///
/// Filters and sort order are baked in by the implementor. Implementations
/// must fail with [`ErrorKind::RangeNotSatisfiable`] when asked for a page
/// beyond the end of the data, and with any other kind on backend failure.
///
/// Plain async closures implement this trait:
///
/// ```rust,ignore
/// let fetcher = |page: u32, _size: u32| async move {
///     Ok::<_, Error>(PageResult::new(vec![page]))
/// };
/// ```
///
/// [`ErrorKind::RangeNotSatisfiable`]: crate::ErrorKind::RangeNotSatisfiable
#[async_trait::async_trait]
pub trait PageFetcher<T>: Send + Sync {
    /// Fetches page `page` (1-based) holding at most `page_size` items.
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<PageResult<T>>;
}

/// Shared, type-erased fetcher handle.
pub type SharedFetcher<T> = Arc<dyn PageFetcher<T>>;

#[async_trait::async_trait]
impl<T, F, Fut> PageFetcher<T> for F
where
    T: Send + 'static,
    F: Fn(u32, u32) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PageResult<T>>> + Send + 'static,
{
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<PageResult<T>> {
        (self)(page, page_size).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continues_prefers_explicit_flag() {
        let page = PageResult::new(vec![1, 2]).with_has_next_page(true);
        assert!(page.continues(20));

        let page = PageResult::new(vec![0; 20]).with_has_next_page(false);
        assert!(!page.continues(20));
    }

    #[test]
    fn continues_falls_back_to_full_page() {
        assert!(PageResult::new(vec![0; 20]).continues(20));
        assert!(!PageResult::new(vec![0; 5]).continues(20));
    }

    #[test]
    fn empty_page_is_terminal() {
        let page: PageResult<u8> = PageResult::empty();
        assert!(page.is_empty());
        assert!(!page.continues(20));
    }

    #[test]
    fn deserializes_data_alias() {
        let page: PageResult<u32> =
            serde_json::from_str(r#"{"data":[1,2,3],"totalCount":45}"#).unwrap();
        assert_eq!(page.items, vec![1, 2, 3]);
        assert_eq!(page.total_count, Some(45));
        assert_eq!(page.has_next_page, None);
    }

    #[tokio::test]
    async fn closures_are_fetchers() {
        let fetcher = |page: u32, size: u32| async move {
            Ok::<_, crate::Error>(PageResult::new(vec![page * 100 + size]))
        };
        let shared: SharedFetcher<u32> = Arc::new(fetcher);

        let page = shared.fetch_page(2, 20).await.unwrap();
        assert_eq!(page.items, vec![220]);
    }
}
