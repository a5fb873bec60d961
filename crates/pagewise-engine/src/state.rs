//! Accumulated state and the merge rules.

use std::collections::HashSet;
use std::sync::Arc;

use pagewise_core::{Error, Identified, PageResult, PageWindow};

use crate::ScrollSnapshot;

/// Merged view across every page fetched so far for one key.
pub(crate) struct Accumulated<T: Identified> {
    items: Vec<T>,
    seen: HashSet<T::Id>,
    /// Length and leading id of the page 1 currently held.
    first_page: Option<(usize, Option<T::Id>)>,
    pub current_page: u32,
    pub has_next_page: bool,
    pub total_count: Option<u64>,
    pub is_loading: bool,
    pub is_loading_more: bool,
    pub error: Option<Arc<Error>>,
    /// Page whose failure populated `error`.
    pub error_page: Option<u32>,
}

impl<T: Identified + Clone> Accumulated<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
            first_page: None,
            current_page: 0,
            has_next_page: true,
            total_count: None,
            is_loading: false,
            is_loading_more: false,
            error: None,
            error_page: None,
        }
    }

    /// Returns whether page 1 has been merged.
    pub fn is_seeded(&self) -> bool {
        self.current_page > 0
    }

    /// Returns whether `page` matches the held first page by length and
    /// leading id.
    pub fn same_first_page(&self, page: &PageResult<T>) -> bool {
        self.first_page.as_ref().is_some_and(|(len, first)| {
            *len == page.len() && *first == page.items.first().map(Identified::id)
        })
    }

    /// Replaces everything held with page 1.
    pub fn seed(&mut self, page: PageResult<T>, page_size: u32) {
        self.items.clear();
        self.seen.clear();
        self.first_page = Some((page.len(), page.items.first().map(Identified::id)));
        self.current_page = 1;
        self.error = None;
        self.error_page = None;
        self.absorb(page, page_size);
    }

    /// Appends `page` as page `number`, skipping ids already held.
    ///
    /// Returns the number of items added.
    pub fn merge(&mut self, number: u32, page: PageResult<T>, page_size: u32) -> usize {
        let before = self.items.len();
        self.current_page = number;
        self.recovered(number);
        self.absorb(page, page_size);
        self.items.len() - before
    }

    fn absorb(&mut self, page: PageResult<T>, page_size: u32) {
        self.has_next_page = page.continues(page_size);
        if let Some(total) = page.total_count {
            self.total_count = Some(total);
        }

        for item in page.items {
            if self.seen.insert(item.id()) {
                self.items.push(item);
            }
        }

        if self.reaches_total(page_size) {
            self.has_next_page = false;
        }
    }

    /// Returns whether the pages merged so far already cover the known total.
    pub fn reaches_total(&self, page_size: u32) -> bool {
        match self.total_count {
            Some(total) if self.is_seeded() => {
                PageWindow::new(self.current_page, page_size).reaches(total)
            }
            _ => false,
        }
    }

    /// Clears the error when it was recorded for `page`, which has since
    /// loaded.
    ///
    /// Returns whether an error was cleared.
    pub fn recovered(&mut self, page: u32) -> bool {
        if self.error_page != Some(page) {
            return false;
        }
        self.error = None;
        self.error_page = None;
        true
    }

    /// Records a failed page load.
    pub fn fail(&mut self, page: u32, error: Error) {
        self.error = Some(Arc::new(error));
        self.error_page = Some(page);
    }

    /// Clears everything for a new dataset.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn snapshot(&self) -> ScrollSnapshot<T> {
        ScrollSnapshot {
            data: self.items.clone(),
            is_loading: self.is_loading,
            is_loading_more: self.is_loading_more,
            has_next_page: self.has_next_page,
            error: self.error.clone(),
            total_count: self.total_count,
            current_page: self.current_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row(u32);

    impl Identified for Row {
        type Id = u32;

        fn id(&self) -> u32 {
            self.0
        }
    }

    fn page(ids: impl IntoIterator<Item = u32>) -> PageResult<Row> {
        PageResult::new(ids.into_iter().map(Row).collect())
    }

    #[test]
    fn seed_replaces_previous_items() {
        let mut state = Accumulated::new();
        state.seed(page(1..=20), 20);
        state.merge(2, page(21..=40), 20);
        state.seed(page(100..=119), 20);

        assert_eq!(state.items().len(), 20);
        assert_eq!(state.items()[0], Row(100));
        assert_eq!(state.current_page, 1);
    }

    #[test]
    fn merge_skips_known_ids() {
        let mut state = Accumulated::new();
        state.seed(page(1..=20), 20);
        let added = state.merge(2, page(18..=37), 20);

        assert_eq!(added, 17);
        assert_eq!(state.items().len(), 37);
        let unique: HashSet<_> = state.items().iter().map(Row::id).collect();
        assert_eq!(unique.len(), state.items().len());
    }

    #[test]
    fn seed_deduplicates_within_page() {
        let mut state = Accumulated::new();
        state.seed(page([1, 2, 2, 3]), 20);
        assert_eq!(state.items().len(), 3);
    }

    #[test]
    fn short_page_ends_paging() {
        let mut state = Accumulated::new();
        state.seed(page(1..=20), 20);
        assert!(state.has_next_page);
        state.merge(2, page(21..=25), 20);
        assert!(!state.has_next_page);
    }

    #[test]
    fn known_total_overrides_explicit_flag() {
        let mut state = Accumulated::new();
        let first = page(1..=20).with_total_count(20).with_has_next_page(true);
        state.seed(first, 20);

        assert!(!state.has_next_page);
        assert!(state.reaches_total(20));
    }

    #[test]
    fn same_first_page_compares_length_and_leading_id() {
        let mut state = Accumulated::new();
        assert!(!state.same_first_page(&page(1..=20)));

        state.seed(page(1..=20), 20);
        assert!(state.same_first_page(&page(1..=20)));
        assert!(!state.same_first_page(&page(1..=19)));
        assert!(!state.same_first_page(&page(2..=21)));
    }

    #[test]
    fn error_clears_when_failed_page_succeeds() {
        let mut state = Accumulated::new();
        state.seed(page(1..=20), 20);
        state.fail(2, Error::backend());
        assert!(state.error.is_some());

        state.merge(2, page(21..=40), 20);
        assert!(state.error.is_none());
    }
}
