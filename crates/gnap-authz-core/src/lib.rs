//! # GNAP Authz Core
//!
//! Pure data model for the GNAP authorization core: client keys, sessions,
//! access tokens, and the already-parsed protocol messages the handler
//! consumes and produces.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`ClientKey`] - A public key plus the proof method that binds requests to it
//! - [`ClientId`] - Opaque identifier handed to a client for by-reference use
//! - [`TokenValue`] - Unguessable value of a continuation or access token
//! - [`Session`] - The authoritative record for one client or resource server
//! - [`AccessToken`] - A token issued after consent, owned by exactly one session
//!
//! ## Identity
//!
//! Sessions are looked up by key material only. [`KeyFingerprint`] is the
//! Blake3 hash of the raw public key and is what stores index on.

pub mod access;
pub mod crypto;
pub mod error;
pub mod key;
pub mod protocol;
pub mod session;
pub mod types;

pub use access::{AccessDescriptor, AccessItem, AccessToken, TokenFlag, TokenRequest};
pub use crypto::{Ed25519PublicKey, Ed25519Signature, KeyFingerprint, Keypair};
pub use error::{CoreError, Result};
pub use key::{ClientKey, ProofMethod};
pub use protocol::{
    AccessRequest, AccessResponse, ClientInstance, ConsentResult, ContinueGrantResponse,
    ContinueRequest, ContinueResponse, InteractFinish, InteractRequest, InteractResponse,
    IntrospectRequest, IntrospectResponse,
};
pub use session::{ContinueToken, Session};
pub use types::{now_millis, ClientId, TokenValue};
