#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for list binding and subscription changes.
pub const TRACING_TARGET_LIST: &str = "pagewise_list::list";

/// Tracing target for page reads.
pub const TRACING_TARGET_FETCH: &str = "pagewise_list::fetch";

mod fetcher;
mod filter;
mod list;
mod resource;

pub mod prelude;

pub use fetcher::ResourceFetcher;
pub use filter::{ListFilter, MATCH_ALL};
pub use list::{EntityList, EntityListBuilder, list_key};
pub use resource::ListResource;
