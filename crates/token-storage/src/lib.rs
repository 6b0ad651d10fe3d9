//! Session persistence for Toune.
//!
//! This crate provides:
//! - **TokenStore**: save/load/clear of the signed-in [`Session`] plus the
//!   transient PKCE values of a login in progress
//! - **FileStorage**: a JSON file backend with atomic replace
//! - **MemoryStorage**: an in-process backend

mod file;
mod keys;
mod memory;
mod session;
mod token_store;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use session::Session;
pub use token_store::{PendingLogin, TokenStore};
pub use traits::KeyValueStorage;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific failure
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
