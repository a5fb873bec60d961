//! Page number to row window arithmetic.
//!
//! Pages are 1-based. Page `n` of size `s` covers the inclusive row range
//! `[(n - 1) * s, n * s - 1]`.

use serde::{Deserialize, Serialize};

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Maximum number of items per page.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// One page of a collection, expressed as page number and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageWindow {
    /// Page number (1-based).
    pub page: u32,
    /// Number of items per page.
    pub page_size: u32,
}

impl PageWindow {
    /// Creates a window from page number and page size.
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Creates the first window for the given page size.
    pub fn first(page_size: u32) -> Self {
        Self::new(1, page_size)
    }

    /// Returns the window that follows this one.
    #[must_use]
    pub fn next(&self) -> Self {
        Self::new(self.page.saturating_add(1), self.page_size)
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    /// Maximum number of rows to return.
    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }

    /// Inclusive `(from, to)` row range.
    pub fn range(&self) -> (u64, u64) {
        let from = self.offset();
        (from, from + self.limit() - 1)
    }

    /// Number of rows covered by this page and all pages before it.
    pub fn covered(&self) -> u64 {
        u64::from(self.page) * u64::from(self.page_size)
    }

    /// Returns whether this page and its predecessors already reach `total`.
    pub fn reaches(&self, total: u64) -> bool {
        self.covered() >= total
    }

    /// Returns whether rows remain after this page, given the total.
    pub fn has_more(&self, total: u64) -> bool {
        !self.reaches(total)
    }

    /// Returns the total number of pages for `total` rows.
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit())
    }
}

impl Default for PageWindow {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}
