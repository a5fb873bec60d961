//! Binds a subscription to an invalidation callback.

use std::future::Future;

use tokio::task::JoinHandle;

use crate::{ChangeEvent, ChannelFilter, Subscription, TRACING_TARGET_SUBSCRIPTION};

/// Runs a callback for every event of a subscription until dropped.
///
/// Dropping the guard stops the forwarding task, which releases the
/// subscription.
pub struct Invalidator {
    filter: ChannelFilter,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for Invalidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invalidator")
            .field("filter", &self.filter)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Invalidator {
    /// Spawns the forwarding task.
    ///
    /// Events are handled one at a time, in delivery order.
    pub fn spawn<F, Fut>(mut subscription: Subscription, on_change: F) -> Self
    where
        F: Fn(ChangeEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let filter = subscription.filter().clone();
        let channel = filter.channel_name();
        let task = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                tracing::debug!(
                    target: TRACING_TARGET_SUBSCRIPTION,
                    channel = %channel,
                    kind = %event.kind,
                    record_id = ?event.record_id,
                    "Change received, invalidating"
                );
                on_change(event).await;
            }
        });

        Self { filter, task }
    }

    /// Returns the filter of the underlying subscription.
    pub fn filter(&self) -> &ChannelFilter {
        &self.filter
    }

    /// Returns whether the forwarding task is still running.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops forwarding and releases the subscription.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Invalidator {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::{BroadcastFeed, ChangeFeed, ChangeKind};

    async fn settle(feed: &BroadcastFeed) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while feed.active_subscriptions() > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn forwards_events_to_callback() {
        let feed = BroadcastFeed::default();
        let subscription = feed
            .subscribe(ChannelFilter::new("orders").with_tenant("c1"))
            .await
            .unwrap();

        let (sender, mut received) = mpsc::unbounded_channel();
        let invalidator = Invalidator::spawn(subscription, move |event| {
            let sender = sender.clone();
            async move {
                let _ = sender.send(event.kind);
            }
        });
        assert!(invalidator.is_active());

        feed.publish(ChangeEvent::new("orders", ChangeKind::Insert).with_tenant("c1"));
        feed.publish(ChangeEvent::new("orders", ChangeKind::Update).with_tenant("c1"));

        let first = tokio::time::timeout(Duration::from_secs(1), received.recv()).await;
        let second = tokio::time::timeout(Duration::from_secs(1), received.recv()).await;
        assert_eq!(first.unwrap(), Some(ChangeKind::Insert));
        assert_eq!(second.unwrap(), Some(ChangeKind::Update));
    }

    #[tokio::test]
    async fn drop_releases_subscription() {
        let feed = BroadcastFeed::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let subscription = feed.subscribe(ChannelFilter::new("orders")).await.unwrap();

        let counter = Arc::clone(&calls);
        let invalidator = Invalidator::spawn(subscription, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async {}
        });
        assert_eq!(feed.active_subscriptions(), 1);

        invalidator.release();
        settle(&feed).await;

        feed.publish(ChangeEvent::new("orders", ChangeKind::Insert));
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
