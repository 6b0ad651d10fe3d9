//! Resource API error types.

use spotify_auth::AuthError;
use thiserror::Error;

/// Resource API error type.
#[derive(Error, Debug)]
pub enum ApiError {
    /// No usable access token
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Network failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success response
    #[error("API error (HTTP {status}): {body}")]
    Status { status: u16, body: String },

    /// A player command was sent with no active playback device
    #[error("No active playback device")]
    NoActiveDevice,

    /// Response body did not match the expected shape
    #[error("Unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Returns true if the request can reasonably be retried later.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status { status, .. } => *status == 429 || *status >= 500,
            ApiError::Auth(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Returns true if the user must sign in again.
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::Auth(e) if e.requires_login())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Result type alias using ApiError.
pub type ApiResult<T> = Result<T, ApiError>;
