//! Error types for the eve-control core library.

use thiserror::Error;

/// Result type alias using the core [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by an [`HttpClient`](crate::host::HttpClient).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpError {
    /// The request never produced a response (DNS, TLS, connection reset...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("server returned status {0}")]
    Status(u16),
}

/// Failure reported by a [`KeyValueStore`](crate::host::KeyValueStore).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("storage error on `{key}`: {message}")]
pub struct StorageError {
    pub key: String,
    pub message: String,
}

impl StorageError {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Core error types for eve-control operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad credentials, or the login round-trip failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// One of the CSRF endpoints could not be reached.
    #[error("failed to fetch CSRF token: {0}")]
    CsrfFetchFailed(#[source] HttpError),

    /// A ticket was submitted without a selected checkpoint.
    #[error("no checkpoint selected")]
    MissingCheckpoint,

    /// The control request did not yield a usable response.
    #[error("control submission failed: {0}")]
    SubmissionNetwork(String),

    /// The server has no checkpoint configured for this operator.
    #[error("no checkpoint available")]
    NoCheckpoints,

    /// No settings have been saved yet.
    #[error("settings have not been configured")]
    SettingsMissing,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the session must be considered logged out after this error.
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_) | Self::CsrfFetchFailed(_))
    }
}
