//! RAII subscription guard.

use tokio::sync::mpsc;

use crate::{ChangeEvent, ChannelFilter, TRACING_TARGET_SUBSCRIPTION};

type Release = Box<dyn FnOnce() + Send>;

/// A live listener on a change feed.
///
/// Dropping the guard or calling [`unsubscribe`](Self::unsubscribe) releases
/// the listener. The release runs exactly once.
pub struct Subscription {
    filter: ChannelFilter,
    events: mpsc::Receiver<ChangeEvent>,
    release: Option<Release>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("filter", &self.filter)
            .field("active", &self.release.is_some())
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// Wraps a receiving channel; `release` runs when the guard is released.
    pub fn new(
        filter: ChannelFilter,
        events: mpsc::Receiver<ChangeEvent>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        tracing::debug!(
            target: TRACING_TARGET_SUBSCRIPTION,
            channel = %filter.channel_name(),
            "Subscription acquired"
        );
        Self {
            filter,
            events,
            release: Some(Box::new(release)),
        }
    }

    /// Returns the filter this subscription was created with.
    pub fn filter(&self) -> &ChannelFilter {
        &self.filter
    }

    /// Waits for the next event. Returns `None` once the feed stops.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Returns a buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.events.try_recv().ok()
    }

    /// Releases the listener.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(release) = self.release.take() {
            self.events.close();
            release();
            tracing::debug!(
                target: TRACING_TARGET_SUBSCRIPTION,
                channel = %self.filter.channel_name(),
                "Subscription released"
            );
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
