//! Transport errors of the PostgREST client and their mapping onto the
//! shared error kinds.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Transport-level failure.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// A header value could not be encoded.
    #[error("Invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}

impl From<Error> for crate::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Reqwest(e) => {
                if e.is_timeout() {
                    crate::Error::timeout()
                        .with_message(e.to_string())
                        .with_source(e)
                } else if e.is_connect() {
                    crate::Error::network_error()
                        .with_message("Connection failed")
                        .with_source(e)
                } else if e.is_decode() {
                    crate::Error::serialization()
                        .with_message(e.to_string())
                        .with_source(e)
                } else {
                    crate::Error::network_error()
                        .with_message(e.to_string())
                        .with_source(e)
                }
            }
            Error::Serde(e) => crate::Error::serialization()
                .with_message(e.to_string())
                .with_source(e),
            Error::Header(e) => crate::Error::configuration()
                .with_message(e.to_string())
                .with_source(e),
        }
    }
}

/// Error payload returned by PostgREST.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

/// PostgREST code for a range starting past the last row.
const RANGE_NOT_SATISFIABLE_CODE: &str = "PGRST103";

/// Maps a non-success response onto the shared error type.
pub(crate) fn status_error(status: StatusCode, body: &str, table: &str) -> crate::Error {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = match (parsed.message, parsed.details) {
        (Some(message), Some(details)) => format!("{message} ({details})"),
        (Some(message), None) => message,
        (None, _) if body.trim().is_empty() => status.to_string(),
        (None, _) => body.trim().to_owned(),
    };

    let error = if status == StatusCode::RANGE_NOT_SATISFIABLE
        || parsed.code.as_deref() == Some(RANGE_NOT_SATISFIABLE_CODE)
    {
        crate::Error::range_not_satisfiable()
    } else {
        match status {
            StatusCode::NOT_FOUND => crate::Error::new(crate::ErrorKind::NotFound),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => crate::Error::timeout(),
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => {
                crate::Error::network_error()
            }
            StatusCode::BAD_REQUEST => crate::Error::invalid_input(),
            _ => crate::Error::backend(),
        }
    };

    error
        .with_message(message)
        .with_context(format!("select from '{table}' returned {status}"))
}
