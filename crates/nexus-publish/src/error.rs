//! Publish error types.

use std::path::PathBuf;

use nexus_models::SessionError;
use thiserror::Error;

/// Result type for publish operations.
pub type PublishResult<T> = Result<T, PublishError>;

/// HTTP statuses treated as transient server failures.
pub const TRANSIENT_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Errors that can occur while publishing a video.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("Request rejected with {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Upload made no progress at byte {offset}")]
    NoProgress { offset: u64 },

    #[error("Upload failed after {retries} retries: {source}")]
    RetriesExhausted {
        retries: u32,
        #[source]
        source: Box<PublishError>,
    },

    #[error("Thumbnail attach failed: {0}")]
    ThumbnailAttach(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Video file is empty: {0}")]
    EmptyVideo(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upload session error: {0}")]
    Session(#[from] SessionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PublishError {
    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::AuthFailed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::AuthFailed(message),
            500..=599 => Self::ServerError { status, message },
            _ => Self::Rejected { status, message },
        }
    }

    /// Whether the upload should back off and resend.
    pub fn is_retryable(&self) -> bool {
        match self {
            PublishError::ServerError { status, .. } => TRANSIENT_STATUSES.contains(status),
            PublishError::Network(e) => !e.is_decode() && !e.is_builder(),
            PublishError::NoProgress { .. } => true,
            _ => false,
        }
    }

    /// HTTP status, if the error came from a response.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            PublishError::ServerError { status, .. } | PublishError::Rejected { status, .. } => {
                Some(*status)
            }
            PublishError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
