#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
mod identity;
mod key;
mod page;
mod pagination;
mod tenant;

pub mod prelude;

pub use error::{BoxedError, Error, ErrorKind, Result};
pub use identity::Identified;
pub use key::{KeyToken, QueryKey};
pub use page::{PageFetcher, PageResult, SharedFetcher};
pub use pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PageWindow};
pub use tenant::{TenantContext, TenantId};
