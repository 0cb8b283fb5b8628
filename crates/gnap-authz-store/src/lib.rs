//! # GNAP Authz Store
//!
//! Session persistence for the authorization core. Provides a trait-based
//! interface with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! Every client instance and resource server the server has seen is a
//! [`Session`](gnap_authz_core::Session), reachable by client id, key
//! fingerprint, current continuation token, and any of its access tokens.
//! The protocol handler talks only to the [`SessionStore`] trait.
//!
//! ## Key Types
//!
//! - [`SessionStore`] - The async trait for all storage operations
//! - [`SqliteSessionStore`] - SQLite-based persistent storage
//! - [`MemorySessionStore`] - In-memory storage for tests and single-process use
//! - [`SessionLookup`] - Result of a get-or-create by key
//! - [`ContinuationGrant`] - Everything a redeemed continuation commits
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gnap_authz_store::{SessionStore, SqliteSessionStore};
//! use gnap_authz_core::{ClientKey, Keypair};
//!
//! async fn example() {
//!     let store = SqliteSessionStore::open("sessions.db").unwrap();
//!
//!     let key = ClientKey::httpsig(Keypair::generate().public_key());
//!     let lookup = store.get_or_create_by_key(&key).await.unwrap();
//!     println!("client {}", lookup.session().client_id);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Missing is not an error**: lookups return `Ok(None)`
//! - **One session per key**: concurrent first sightings agree on one session
//! - **Atomic continuation**: token install and redemption are single updates

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;
pub use traits::{ContinuationGrant, SessionLookup, SessionStore};
