//! Error types for the policy module.

use thiserror::Error;

/// Errors that can occur while deciding permissions or loading a policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A request named an access type the policy does not know.
    #[error("unknown access type: {0}")]
    UnknownAccessType(String),

    /// The policy document could not be parsed.
    #[error("invalid policy config: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    /// The policy document parsed but is inconsistent.
    #[error("duplicate access type: {0}")]
    DuplicateAccessType(String),
}

/// Result type for policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;
