//! Error types for the GNAP Authz Core.

use thiserror::Error;

/// Core errors raised while decoding keys, identifiers, and signatures.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid hex encoding: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid length for {what}: expected {expected} bytes, got {got}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
