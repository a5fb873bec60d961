//! Engine construction options.

use std::time::Duration;

use pagewise_cache::{CacheOptions, DEFAULT_GC_TIME};
use pagewise_core::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What `load_more` does with `has_next_page` after a failure that is not an
/// out-of-range page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[derive(Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PagingFailurePolicy {
    /// Fail closed: clear `has_next_page` so paging stops.
    #[default]
    StopPaging,
    /// Keep `has_next_page` so the next `load_more` retries the same page.
    AllowRetry,
}

/// Options for one [`InfiniteScroll`] instance.
///
/// [`InfiniteScroll`]: crate::InfiniteScroll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollOptions {
    /// Items per page.
    pub page_size: u32,
    /// When false no fetch happens until enabled.
    pub enabled: bool,
    /// How long cached pages are served without refetching.
    pub stale_time: Duration,
    /// How long unused cached pages are retained.
    pub gc_time: Duration,
    /// Revalidate the first page when the consumer regains focus.
    pub refetch_on_window_focus: bool,
    /// Revalidate the first page on mount even when a cached copy exists.
    pub refetch_on_mount: bool,
    /// Behaviour after a failed `load_more`.
    pub failure_policy: PagingFailurePolicy,
}

impl ScrollOptions {
    /// Sets the page size, clamped to `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Enables or disables fetching.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the freshness window of cached pages.
    #[must_use]
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    /// Sets the retention window of unused cached pages.
    #[must_use]
    pub fn with_gc_time(mut self, gc_time: Duration) -> Self {
        self.gc_time = gc_time;
        self
    }

    /// Enables revalidation on window focus.
    #[must_use]
    pub fn with_refetch_on_window_focus(mut self, refetch: bool) -> Self {
        self.refetch_on_window_focus = refetch;
        self
    }

    /// Controls revalidation on mount.
    #[must_use]
    pub fn with_refetch_on_mount(mut self, refetch: bool) -> Self {
        self.refetch_on_mount = refetch;
        self
    }

    /// Sets the failure policy.
    #[must_use]
    pub fn with_failure_policy(mut self, policy: PagingFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Returns the cache options derived from these settings.
    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions::new(self.stale_time, self.gc_time)
    }
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            enabled: true,
            stale_time: Duration::ZERO,
            gc_time: DEFAULT_GC_TIME,
            refetch_on_window_focus: false,
            refetch_on_mount: true,
            failure_policy: PagingFailurePolicy::default(),
        }
    }
}
