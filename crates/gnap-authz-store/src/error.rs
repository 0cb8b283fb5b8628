//! Error types for the store module.
//!
//! Lookups report a missing session as `Ok(None)`, never as an error. Every
//! variant here is a store-side failure or a violated precondition of a
//! mutation.

use gnap_authz_core::ClientId;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Encoding or decoding of a stored value failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A mutation addressed a session that does not exist.
    #[error("session not found: {0}")]
    SessionNotFound(ClientId),

    /// An access token value is already in use somewhere in the store.
    #[error("access token value already issued")]
    DuplicateToken,

    /// The continuation token being redeemed is no longer the session's
    /// current one.
    #[error("continuation token is not current for session {0}")]
    StaleContinuation(ClientId),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A blocking task or lock failed.
    #[error("store task failed: {0}")]
    Task(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
