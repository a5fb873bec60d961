//! The row store contract.

use std::sync::Arc;

use pagewise_core::Result;

use crate::{ListQuery, RowSet};

/// Executes bounded list reads.
///
/// Implementations fail with `ErrorKind::RangeNotSatisfiable` when the
/// requested range starts past the last matching row.
#[async_trait::async_trait]
pub trait RowStore: Send + Sync {
    /// Runs `query` and returns the selected rows.
    async fn select(&self, query: &ListQuery) -> Result<RowSet>;
}

/// Shared, type-erased store handle.
pub type SharedStore = Arc<dyn RowStore>;
