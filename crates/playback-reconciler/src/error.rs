//! Reconciler error types.

use spotify_api::ApiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    /// The local playback device could not carry out the command
    #[error("Local device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The remote control endpoint failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The reconciler task is no longer running
    #[error("Playback reconciler stopped")]
    Stopped,
}

impl ReconcileError {
    /// Returns true if the user must sign in again.
    pub fn requires_login(&self) -> bool {
        matches!(self, ReconcileError::Api(e) if e.requires_login())
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
