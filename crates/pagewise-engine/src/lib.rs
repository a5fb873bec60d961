#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for page loads and merges.
pub const TRACING_TARGET_ENGINE: &str = "pagewise_engine::engine";

/// Tracing target for cancellation, refresh and teardown.
pub const TRACING_TARGET_LIFECYCLE: &str = "pagewise_engine::lifecycle";

mod engine;
mod options;
mod snapshot;
mod state;

pub mod prelude;

pub use engine::{InfiniteScroll, LoadOutcome, WeakInfiniteScroll};
pub use options::{PagingFailurePolicy, ScrollOptions};
pub use snapshot::ScrollSnapshot;
