//! # GNAP Authz
//!
//! The protocol core of a GNAP authorization server: grant requests,
//! continuation after resource-owner consent, and token introspection for
//! resource servers.
//!
//! ## Overview
//!
//! [`AuthHandler`] works on already-parsed requests and talks to three
//! collaborators:
//!
//! - a [`SessionStore`](store::SessionStore) holding every client and
//!   resource server the server has seen
//! - an [`AccessPolicy`](policy::AccessPolicy) deciding what needs consent
//!   and what subject data a token may disclose
//! - an [`InteractionHandler`] driving login and consent
//!
//! Each request also brings a [`RequestVerifier`] built by the transport,
//! which checks proof of possession of the caller's key.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use gnap_authz::{AuthHandler, HandlerConfig, InteractionHandler};
//! use gnap_authz::policy::ConfigPolicy;
//! use gnap_authz::store::SqliteSessionStore;
//!
//! fn build(interaction: Arc<dyn InteractionHandler>) -> AuthHandler<SqliteSessionStore> {
//!     let store = SqliteSessionStore::open("sessions.db").unwrap();
//!     let policy = ConfigPolicy::from_json(r#"{"access_types": []}"#).unwrap();
//!
//!     AuthHandler::new(
//!         Arc::new(store),
//!         Arc::new(policy),
//!         interaction,
//!         HandlerConfig::default(),
//!     )
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `gnap_authz::core` - Data model and protocol messages
//! - `gnap_authz::store` - Session stores
//! - `gnap_authz::policy` - Access policy

pub mod config;
pub mod error;
pub mod handler;
pub mod interaction;
pub mod verifier;

// Re-export component crates
pub use gnap_authz_core as core;
pub use gnap_authz_policy as policy;
pub use gnap_authz_store as store;

// Re-export main types for convenience
pub use config::{HandlerConfig, KeyPolicy};
pub use error::{AuthError, ErrorKind, InteractionError, Result, VerifyError};
pub use handler::{AuthHandler, InactiveReason, TokenLookup};
pub use interaction::InteractionHandler;
pub use verifier::{RequestVerifier, SignedRequestVerifier};

// Re-export commonly used core types
pub use gnap_authz_core::{
    AccessDescriptor, AccessRequest, AccessResponse, AccessToken, ClientId, ClientInstance,
    ClientKey, ConsentResult, ContinueGrantResponse, ContinueRequest, InteractRequest,
    InteractResponse, IntrospectRequest, IntrospectResponse, Keypair, ProofMethod, Session,
    TokenFlag, TokenRequest, TokenValue,
};
