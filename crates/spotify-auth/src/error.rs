//! Authentication error types.

use thiserror::Error;
use token_storage::StorageError;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The `state` on the callback does not match the pending login
    #[error("Authorization state mismatch")]
    StateMismatch,

    /// No pending code verifier (callback replayed, or storage cleared)
    #[error("No pending code verifier; start a new login")]
    MissingVerifier,

    /// The token endpoint rejected the authorization code
    #[error("Token exchange failed (HTTP {status}): {body}")]
    TokenExchangeFailed { status: u16, body: String },

    /// The token endpoint rejected the refresh token
    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    /// Refresh requested without a stored refresh token
    #[error("No refresh token stored")]
    NoRefreshToken,

    /// The session is gone; the user must sign in again
    #[error("Authentication required")]
    AuthenticationRequired,

    /// Network failure talking to the authorization server
    #[error("Transport error: {0}")]
    Transport(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid state transition in the auth FSM
    #[error("Invalid auth state transition: {0}")]
    InvalidStateTransition(String),

    /// The loopback callback never arrived
    #[error("Timed out waiting for the authorization callback")]
    CallbackTimeout,

    /// The authorization server redirected back with an error
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Transport(_) | AuthError::CallbackTimeout => true,
            AuthError::TokenExchangeFailed { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if every dependent view should fall back to signed-out.
    pub fn requires_login(&self) -> bool {
        matches!(self, AuthError::AuthenticationRequired)
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Transport(err.to_string())
    }
}

impl From<toune_config::ConfigError> for AuthError {
    fn from(err: toune_config::ConfigError) -> Self {
        AuthError::Config(err.to_string())
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
