//! Proof-of-possession verification.
//!
//! The transport builds a [`RequestVerifier`] per request, capturing whatever
//! it needs (headers, body, TLS state), and the handler calls it with the key
//! bound to the resolved session.

use gnap_authz_core::{ClientKey, Ed25519Signature, ProofMethod};

use crate::error::VerifyError;

/// Checks that a request proves possession of a key.
pub trait RequestVerifier: Send + Sync {
    /// Verify the request against `key`.
    fn verify(&self, key: &ClientKey) -> Result<(), VerifyError>;
}

/// Verifies a detached Ed25519 signature over the request's signing input.
///
/// Works for the signature-based proof methods; a key bound to mutual TLS
/// cannot be checked this way.
#[derive(Debug, Clone)]
pub struct SignedRequestVerifier {
    /// The signing input the transport reconstructed from the request.
    pub message: Vec<u8>,
    pub signature: Ed25519Signature,
}

impl SignedRequestVerifier {
    pub fn new(message: impl Into<Vec<u8>>, signature: Ed25519Signature) -> Self {
        Self {
            message: message.into(),
            signature,
        }
    }
}

impl RequestVerifier for SignedRequestVerifier {
    fn verify(&self, key: &ClientKey) -> Result<(), VerifyError> {
        if key.proof == ProofMethod::Mtls {
            return Err(VerifyError::UnsupportedMethod(key.proof.clone()));
        }
        key.public_key
            .verify(&self.message, &self.signature)
            .map_err(|_| VerifyError::InvalidSignature)
    }
}
