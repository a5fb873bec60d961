//! The change feed contract.

use std::sync::Arc;

use pagewise_core::Result;

use crate::{ChannelFilter, Subscription};

/// Source of table change notifications.
#[async_trait::async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Starts delivering events that pass `filter`.
    ///
    /// Delivery stops when the returned guard is dropped or unsubscribed.
    async fn subscribe(&self, filter: ChannelFilter) -> Result<Subscription>;
}

/// Shared, type-erased feed handle.
pub type SharedFeed = Arc<dyn ChangeFeed>;
