//! Item identity used to keep accumulated lists free of duplicates.

use std::fmt::Debug;
use std::hash::Hash;

/// An item with a stable identity across pages.
///
/// Two items with equal ids are the same logical row, even when one was
/// fetched before a concurrent write shifted page boundaries.
pub trait Identified {
    /// The identity type, usually the primary key.
    type Id: Eq + Hash + Clone + Debug + Send + Sync;

    /// Returns the identity of this item.
    fn id(&self) -> Self::Id;
}

impl<T: Identified> Identified for std::sync::Arc<T> {
    type Id = T::Id;

    fn id(&self) -> Self::Id {
        self.as_ref().id()
    }
}
