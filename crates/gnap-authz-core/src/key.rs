//! Client keys and proof-of-possession methods.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{Ed25519PublicKey, KeyFingerprint};

/// How a request proves possession of a bound key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ProofMethod {
    /// HTTP message signatures.
    HttpSig,
    /// Detached JWS.
    Jwsd,
    /// Mutual TLS.
    Mtls,
    /// Any other registered method, kept verbatim.
    Other(String),
}

impl ProofMethod {
    /// The wire name of the method.
    pub fn as_str(&self) -> &str {
        match self {
            ProofMethod::HttpSig => "httpsig",
            ProofMethod::Jwsd => "jwsd",
            ProofMethod::Mtls => "mtls",
            ProofMethod::Other(name) => name,
        }
    }
}

impl From<&str> for ProofMethod {
    fn from(s: &str) -> Self {
        match s {
            "httpsig" => ProofMethod::HttpSig,
            "jwsd" => ProofMethod::Jwsd,
            "mtls" => ProofMethod::Mtls,
            other => ProofMethod::Other(other.to_string()),
        }
    }
}

impl From<String> for ProofMethod {
    fn from(s: String) -> Self {
        ProofMethod::from(s.as_str())
    }
}

impl From<ProofMethod> for String {
    fn from(method: ProofMethod) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for ProofMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A public key plus the proof method used to bind requests to it.
///
/// Immutable once bound to a session. Stores identify a key by its
/// [`KeyFingerprint`], so two `ClientKey`s that differ only in `proof`
/// resolve to the same session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientKey {
    /// The public key material.
    #[serde(rename = "key")]
    pub public_key: Ed25519PublicKey,
    /// The proof-of-possession method.
    pub proof: ProofMethod,
}

impl ClientKey {
    /// Create a new client key.
    pub fn new(public_key: Ed25519PublicKey, proof: ProofMethod) -> Self {
        Self { public_key, proof }
    }

    /// Convenience constructor for an HTTP-signature bound key.
    pub fn httpsig(public_key: Ed25519PublicKey) -> Self {
        Self::new(public_key, ProofMethod::HttpSig)
    }

    /// Lookup identity of this key.
    pub fn fingerprint(&self) -> KeyFingerprint {
        self.public_key.fingerprint()
    }

    /// Whether both keys carry the same key material.
    pub fn same_key(&self, other: &ClientKey) -> bool {
        self.public_key == other.public_key
    }
}
