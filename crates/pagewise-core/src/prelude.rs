//! Prelude module for pagewise-core.
//!
//! Re-exports the types most list implementations need.

pub use crate::{
    Error, ErrorKind, Identified, KeyToken, PageFetcher, PageResult, PageWindow, QueryKey, Result,
    SharedFetcher, TenantContext, TenantId,
};
