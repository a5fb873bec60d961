//! PostgREST-style HTTP row store.
//!
//! ```rust,ignore
//! use pagewise_store::rest::{RestConfig, RestStore};
//!
//! let config = RestConfig::new("https://db.example.com/rest/v1").with_api_key(key);
//! let store = RestStore::new(config)?;
//! let rows = store.select(&query).await?;
//! ```

mod client;
mod config;
mod error;
mod params;

pub use client::RestStore;
pub use config::{DEFAULT_TIMEOUT_SECS, RestConfig};
pub use error::{Error, Result};
pub use params::ContentRange;

/// Tracing target for REST client operations.
pub const TRACING_TARGET: &str = "pagewise_store::rest";
