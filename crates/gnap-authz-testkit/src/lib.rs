//! # GNAP Authz Testkit
//!
//! Testing utilities for the GNAP authorization core.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: A handler wired to an in-memory store, a fixed policy, and
//!   stub collaborators
//! - **Stub collaborators**: [`StaticVerifier`] and [`MemoryInteraction`]
//! - **Generators**: Proptest strategies for keys, token requests, and
//!   consent results
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use gnap_authz_core::{ConsentResult, TokenRequest};
//! use gnap_authz_testkit::{TestClient, TestFixture};
//!
//! async fn example() {
//!     let fixture = TestFixture::new();
//!     let client = TestClient::new();
//!
//!     let (response, grant) = fixture
//!         .grant(
//!             &client,
//!             vec![TokenRequest::reference("read-email")],
//!             "ref-1",
//!             ConsentResult {
//!                 tokens: vec![TokenRequest::reference("read-email")],
//!                 ..Default::default()
//!             },
//!         )
//!         .await
//!         .unwrap();
//!     assert_eq!(grant.access_token.len(), 1);
//!     println!("client {}", response.instance_id);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use gnap_authz_testkit::generators::consent_result;
//!
//! proptest! {
//!     #[test]
//!     fn consent_tokens_bounded(consent in consent_result()) {
//!         prop_assert!(consent.tokens.len() <= 4);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    multi_party_clients, MemoryInteraction, StaticVerifier, TestClient, TestFixture,
    DEFAULT_POLICY, TEST_MESSAGE,
};
