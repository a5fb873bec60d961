#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for feed delivery.
pub const TRACING_TARGET_FEED: &str = "pagewise_realtime::feed";

/// Tracing target for subscription acquire and release.
pub const TRACING_TARGET_SUBSCRIPTION: &str = "pagewise_realtime::subscription";

mod broadcast;
mod error;
mod event;
mod feed;
mod invalidator;
mod subscription;

#[cfg(feature = "nats")]
#[cfg_attr(docsrs, doc(cfg(feature = "nats")))]
pub mod nats;

pub use broadcast::{BroadcastFeed, DEFAULT_CAPACITY};
pub use error::Error;
pub use event::{ChangeEvent, ChangeKind, ChannelFilter};
pub use feed::{ChangeFeed, SharedFeed};
pub use invalidator::Invalidator;
pub use pagewise_core::Result;
pub use subscription::Subscription;
