//! Error types for the protocol handler.

use gnap_authz_core::ProofMethod;
use gnap_authz_policy::PolicyError;
use gnap_authz_store::StoreError;
use thiserror::Error;

/// Errors returned by [`AuthHandler`](crate::AuthHandler) operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The request is structurally unusable.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// A client or resource server referenced by id, or presented by a key
    /// the key policy refuses to trust, has no session.
    #[error("unknown client")]
    UnknownClient,

    /// The continuation token does not name a current continuation.
    #[error("unknown continuation")]
    UnknownContinuation,

    /// The request did not prove possession of the session's key.
    #[error("request verification failed: {0}")]
    Authentication(#[from] VerifyError),

    /// The access policy rejected the request.
    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    /// The interaction handler failed.
    #[error("interaction error: {0}")]
    Interaction(#[from] InteractionError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Coarse classification of an [`AuthError`] for transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fix the request and retry.
    Malformed,
    /// The referenced client or continuation is gone.
    NotFound,
    /// Proof of possession failed.
    Unauthorized,
    /// A policy or interaction collaborator refused or failed.
    Collaborator,
    /// The server itself failed.
    Internal,
}

impl AuthError {
    /// Shorthand for a malformed-request error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        AuthError::MalformedRequest(reason.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::MalformedRequest(_) => ErrorKind::Malformed,
            AuthError::UnknownClient | AuthError::UnknownContinuation => ErrorKind::NotFound,
            AuthError::Authentication(_) => ErrorKind::Unauthorized,
            AuthError::Policy(_) | AuthError::Interaction(_) => ErrorKind::Collaborator,
            AuthError::Store(_) => ErrorKind::Internal,
        }
    }
}

/// Request verification failures.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The signature did not verify under the session key.
    #[error("invalid signature")]
    InvalidSignature,

    /// The verifier cannot check this proof method.
    #[error("unsupported proof method: {0}")]
    UnsupportedMethod(ProofMethod),

    /// The request carried no proof at all.
    #[error("missing proof")]
    MissingProof,

    /// Any other verifier-specific rejection.
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Failures reported by an interaction handler.
#[derive(Debug, Error)]
pub enum InteractionError {
    /// No interaction is known under this reference.
    #[error("unknown interaction reference: {0}")]
    UnknownReference(String),

    /// The resource owner has not finished the interaction yet.
    #[error("interaction still pending")]
    Pending,

    /// The resource owner refused consent.
    #[error("consent denied")]
    Denied,

    /// Opaque failure inside the interaction handler.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for handler operations.
pub type Result<T> = std::result::Result<T, AuthError>;
