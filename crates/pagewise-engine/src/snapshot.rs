//! Consumer-facing view of an engine.

use std::sync::Arc;

use pagewise_core::Error;

/// The state a list screen binds to.
#[derive(Debug, Clone)]
pub struct ScrollSnapshot<T> {
    /// Accumulated, de-duplicated items.
    pub data: Vec<T>,
    /// True while the first page is loading and nothing is held yet.
    pub is_loading: bool,
    /// True strictly while a `load_more` is in flight.
    pub is_loading_more: bool,
    /// Whether another page may exist.
    pub has_next_page: bool,
    /// The last fetch failure, if any.
    pub error: Option<Arc<Error>>,
    /// Best-known total item count.
    pub total_count: Option<u64>,
    /// Highest page merged so far; 0 before the first page.
    pub current_page: u32,
}

impl<T> ScrollSnapshot<T> {
    /// Returns the number of accumulated items.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns whether no items are held.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns whether the snapshot carries a fetch failure.
    #[inline]
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

impl<T> Default for ScrollSnapshot<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            is_loading: false,
            is_loading_more: false,
            has_next_page: true,
            error: None,
            total_count: None,
            current_page: 0,
        }
    }
}
