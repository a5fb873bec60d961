#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for the in-memory store.
pub const TRACING_TARGET_MEMORY: &str = "pagewise_store::memory";

mod memory;
mod query;
mod row;
mod store;

#[cfg(feature = "rest")]
#[cfg_attr(docsrs, doc(cfg(feature = "rest")))]
pub mod rest;

pub use memory::MemoryStore;
pub use pagewise_core::{Error, ErrorKind, Result};
pub use query::{CompareOp, CountMode, Filter, ListQuery, SortBy, SortOrder};
pub use row::{Record, RowSet};
pub use store::{RowStore, SharedStore};
