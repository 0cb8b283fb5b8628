//! # GNAP Authz Policy
//!
//! The [`AccessPolicy`] contract consulted by the protocol handler, and
//! [`ConfigPolicy`], a policy loaded from a JSON document.
//!
//! ## Usage
//!
//! ```rust
//! use gnap_authz_policy::{AccessPolicy, ConfigPolicy};
//! use gnap_authz_core::AccessDescriptor;
//!
//! let policy = ConfigPolicy::from_json(r#"{
//!     "access_types": [
//!         {"reference": "read-email", "permission": "needs_consent", "subject_keys": ["email"]}
//!     ]
//! }"#).unwrap();
//!
//! let keys = policy.allowed_subject_keys(&[AccessDescriptor::reference("read-email")]);
//! assert!(keys.contains("email"));
//! ```

pub mod config;
pub mod error;
pub mod policy;

pub use config::{AccessType, Permission, PolicyConfig};
pub use error::{PolicyError, Result};
pub use policy::{AccessPolicy, ConfigPolicy, PermissionDecision};
