//! Prelude module for pagewise-engine.

pub use pagewise_cache::{MemoryCache, QueryCache, SharedCache};
pub use pagewise_core::prelude::*;

pub use crate::{InfiniteScroll, LoadOutcome, PagingFailurePolicy, ScrollOptions, ScrollSnapshot};
