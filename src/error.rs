//! Error types for the chat client.

use std::time::Duration;

use thiserror::Error;

/// Client error type.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading a local file (image, audio) failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend returned a non-success status.
    #[error("HTTP {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the backend.
        message: String,
    },

    /// No data arrived within the configured window.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// The request was cancelled by the caller.
    #[error("Request aborted")]
    Aborted,

    /// Backend answered successfully but with no text.
    #[error("Empty response from backend")]
    EmptyResponse,

    /// An authenticated call was made without a bearer token.
    #[error("No authentication token")]
    MissingToken,

    /// A request argument was rejected before anything was sent.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Whether this error came from the timeout window rather than the transport.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
