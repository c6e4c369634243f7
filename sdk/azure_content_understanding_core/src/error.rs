use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when interacting with the Content Understanding API.
#[derive(Error, Debug)]
pub enum ContentUnderstandingError {
    /// The HTTP request failed at the transport level (connection, TLS, timeout).
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service rejected a request with a non-success status.
    ///
    /// On submission this means no operation was created (for example a
    /// malformed field schema). `code` is the service error code when the
    /// body carried an `error` object.
    #[error("Request rejected ({status}{}): {message}", .code.as_deref().map(|c| format!(" {c}")).unwrap_or_default())]
    Validation {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The response violated the asynchronous operation contract.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The operation reached the `failed` terminal status.
    #[error("Operation failed ({code}): {message}")]
    OperationFailed { code: String, message: String },

    /// The polling budget was exhausted before a terminal status was observed.
    #[error("Operation timed out after {elapsed:?} (last status: {last_status})")]
    Timeout {
        last_status: String,
        elapsed: Duration,
    },

    /// Polling was cancelled by the caller.
    #[error("Operation polling cancelled (last status: {})", .last_status.as_deref().unwrap_or("none"))]
    Cancelled { last_status: Option<String> },

    /// A response body could not be parsed as JSON.
    #[error("Malformed response: {message}")]
    MalformedResponse {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// The request payload could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The endpoint URL is invalid.
    #[error("Invalid endpoint URL: {message}")]
    InvalidEndpoint {
        message: String,
        #[source]
        source: Option<url::ParseError>,
    },

    /// A required configuration value is missing.
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    /// No usable credential was found.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A request builder was given invalid or incomplete input.
    #[error("Invalid request: {0}")]
    Builder(String),

    /// Reading a local input file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContentUnderstandingError {
    /// Creates an [`InvalidEndpoint`](Self::InvalidEndpoint) error wrapping a URL parse failure.
    pub fn invalid_endpoint_with_source(message: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidEndpoint {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a [`MalformedResponse`](Self::MalformedResponse) error.
    pub fn malformed(message: impl Into<String>, source: serde_json::Error) -> Self {
        Self::MalformedResponse {
            message: message.into(),
            source,
        }
    }

    /// Returns `true` if resubmitting the whole submit and poll cycle may succeed.
    ///
    /// Transport failures, timeouts and throttling or server-side rejections
    /// are transient. Everything else needs a change on the caller's side.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout { .. } => true,
            Self::Validation { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }
}

/// Result type alias for Content Understanding operations.
pub type ContentUnderstandingResult<T> = std::result::Result<T, ContentUnderstandingError>;
