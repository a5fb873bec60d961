//! Failures reported by fetchers, stores and feeds.
//!
//! The engine only branches on [`ErrorKind`]: a page past the end quietly
//! stops paging, every other kind is kept in the snapshot for the consumer.

use std::borrow::Cow;
use std::fmt;

use strum::{AsRefStr, Display, EnumString, IntoStaticStr};
use thiserror::Error;

/// Boxed cause, sendable across tasks.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Result with [`Error`] as the default error.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// What went wrong, independent of the backend that reported it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(AsRefStr, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// A filter, key or page window was malformed.
    InvalidInput,
    /// The store or feed could not be reached.
    NetworkError,
    /// The requested page starts past the last row.
    RangeNotSatisfiable,
    /// The store answered with an error of its own.
    Backend,
    /// A row or event did not have the expected shape.
    Serialization,
    Configuration,
    Timeout,
    /// The operation was abandoned before it finished.
    Cancelled,
    NotFound,
    #[default]
    Unknown,
}

impl ErrorKind {
    /// Returns whether sending the same request again may succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::NetworkError | Self::Timeout)
    }
}

/// A classified failure with an optional message, cause and the resource or
/// key it concerns.
#[must_use]
#[derive(Debug, Error)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: Option<Cow<'static, str>>,
    #[source]
    pub source: Option<BoxedError>,
    /// Resource name or query key the failure belongs to.
    pub context: Option<Cow<'static, str>>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(context) = &self.context {
            write!(f, " {context}")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
            context: None,
        }
    }

    pub fn invalid_input() -> Self {
        Self::new(ErrorKind::InvalidInput)
    }

    pub fn network_error() -> Self {
        Self::new(ErrorKind::NetworkError)
    }

    /// The signal a fetcher returns for a page past the end of the data.
    pub fn range_not_satisfiable() -> Self {
        Self::new(ErrorKind::RangeNotSatisfiable)
    }

    pub fn backend() -> Self {
        Self::new(ErrorKind::Backend)
    }

    pub fn serialization() -> Self {
        Self::new(ErrorKind::Serialization)
    }

    pub fn configuration() -> Self {
        Self::new(ErrorKind::Configuration)
    }

    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled)
    }

    pub fn with_message(self, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: Some(message.into()),
            ..self
        }
    }

    pub fn with_source(self, source: impl Into<BoxedError>) -> Self {
        Self {
            source: Some(source.into()),
            ..self
        }
    }

    /// Names the resource or key the failure belongs to, keeping any
    /// context set closer to the cause.
    pub fn with_context(self, context: impl Into<Cow<'static, str>>) -> Self {
        if self.context.is_some() {
            return self;
        }
        Self {
            context: Some(context.into()),
            ..self
        }
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns whether this error means "no more pages" rather than a
    /// failure.
    #[must_use]
    pub const fn is_range_not_satisfiable(&self) -> bool {
        matches!(self.kind, ErrorKind::RangeNotSatisfiable)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::serialization()
            .with_message(error.to_string())
            .with_source(error)
    }
}
