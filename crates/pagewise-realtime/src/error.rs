//! Feed errors and their mapping onto the shared error kinds.

use thiserror::Error;

/// Failure while subscribing to or publishing on a feed.
#[derive(Debug, Error)]
pub enum Error {
    /// Connecting to the message server failed.
    #[cfg(feature = "nats")]
    #[error("NATS connection error: {0}")]
    Connect(#[from] async_nats::ConnectError),
    /// Subscribing to a subject failed.
    #[cfg(feature = "nats")]
    #[error("NATS subscribe error: {0}")]
    Subscribe(#[from] async_nats::SubscribeError),
    /// Publishing an event failed.
    #[cfg(feature = "nats")]
    #[error("NATS publish error: {0}")]
    Publish(#[from] async_nats::PublishError),
    /// An event could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The feed was shut down.
    #[error("Feed closed")]
    Closed,
}

impl From<Error> for pagewise_core::Error {
    fn from(err: Error) -> Self {
        use pagewise_core::Error as CoreError;

        match err {
            #[cfg(feature = "nats")]
            Error::Connect(e) => CoreError::network_error()
                .with_message("Failed to connect to NATS")
                .with_source(e),
            #[cfg(feature = "nats")]
            Error::Subscribe(e) => CoreError::network_error()
                .with_message(e.to_string())
                .with_source(e),
            #[cfg(feature = "nats")]
            Error::Publish(e) => CoreError::network_error()
                .with_message(e.to_string())
                .with_source(e),
            Error::Serialization(e) => CoreError::serialization()
                .with_message(e.to_string())
                .with_source(e),
            Error::Closed => CoreError::cancelled().with_message("Feed closed"),
        }
    }
}
