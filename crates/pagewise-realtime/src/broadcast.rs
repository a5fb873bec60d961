//! In-process change feed.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pagewise_core::Result;
use tokio::sync::{broadcast, mpsc};

use crate::{
    ChangeEvent, ChangeFeed, ChangeKind, ChannelFilter, Subscription, TRACING_TARGET_FEED,
};

/// Default number of events buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

struct BroadcastFeedInner {
    sender: broadcast::Sender<ChangeEvent>,
    active: AtomicUsize,
    capacity: usize,
}

/// Change feed delivered over a `tokio::sync::broadcast` channel.
///
/// Useful when writes happen in the same process, and as the feed in tests.
/// A subscriber that falls behind receives one synthetic `UPDATE` for its
/// table in place of the events it missed.
#[derive(Clone)]
pub struct BroadcastFeed {
    inner: Arc<BroadcastFeedInner>,
}

impl std::fmt::Debug for BroadcastFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastFeed")
            .field("capacity", &self.inner.capacity)
            .field("active", &self.active_subscriptions())
            .finish()
    }
}

impl Default for BroadcastFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BroadcastFeed {
    /// Creates a feed buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(BroadcastFeedInner {
                sender,
                active: AtomicUsize::new(0),
                capacity,
            }),
        }
    }

    /// Publishes `event` to every subscriber, returning how many listeners
    /// were reached.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        tracing::debug!(
            target: TRACING_TARGET_FEED,
            table = %event.table,
            kind = %event.kind,
            "Publishing change"
        );
        self.inner.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of subscriptions not yet released.
    pub fn active_subscriptions(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ChangeFeed for BroadcastFeed {
    async fn subscribe(&self, filter: ChannelFilter) -> Result<Subscription> {
        let mut source = self.inner.sender.subscribe();
        let (sender, receiver) = mpsc::channel(self.inner.capacity);

        let forward_filter = filter.clone();
        let task = tokio::spawn(async move {
            loop {
                let event = match source.recv().await {
                    Ok(event) if forward_filter.matches(&event) => event,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            target: TRACING_TARGET_FEED,
                            channel = %forward_filter.channel_name(),
                            skipped,
                            "Subscriber lagged, emitting resync"
                        );
                        let mut event = ChangeEvent::new(&forward_filter.table, ChangeKind::Update);
                        event.tenant = forward_filter.tenant.clone();
                        event
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if sender.send(event).await.is_err() {
                    break;
                }
            }
        });

        self.inner.active.fetch_add(1, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        let abort = task.abort_handle();
        Ok(Subscription::new(filter, receiver, move || {
            abort.abort();
            inner.active.fetch_sub(1, Ordering::SeqCst);
        }))
    }
}
