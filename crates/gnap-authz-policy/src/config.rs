//! Policy configuration.
//!
//! A policy document lists the access types the server knows, what it takes
//! to grant each one, and which subject attributes a token of that type may
//! disclose at introspection.
//!
//! ```json
//! {
//!   "access_types": [
//!     { "reference": "read-email", "permission": "needs_consent", "subject_keys": ["email"] },
//!     { "reference": "ping", "permission": "always_grant" }
//!   ]
//! }
//! ```

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, Result};

/// What it takes to grant an access type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Granted without asking the resource owner.
    AlwaysGrant,
    /// Requires an interaction with the resource owner.
    NeedsConsent,
}

/// One access type known to the policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessType {
    /// Name matched against reference descriptors and the `type` of
    /// structured descriptors.
    pub reference: String,
    pub permission: Permission,
    /// Subject attributes a token of this type may disclose.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub subject_keys: BTreeSet<String>,
}

impl AccessType {
    /// An access type that requires consent and discloses nothing.
    pub fn needs_consent(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            permission: Permission::NeedsConsent,
            subject_keys: BTreeSet::new(),
        }
    }

    /// An access type granted without interaction.
    pub fn always_grant(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            permission: Permission::AlwaysGrant,
            subject_keys: BTreeSet::new(),
        }
    }

    /// Allow a subject attribute to be disclosed.
    pub fn with_subject_key(mut self, key: impl Into<String>) -> Self {
        self.subject_keys.insert(key.into());
        self
    }
}

/// A complete policy document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub access_types: Vec<AccessType>,
}

impl PolicyConfig {
    /// Parse and validate a JSON policy document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PolicyConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that no access type is declared twice.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for access_type in &self.access_types {
            if !seen.insert(access_type.reference.as_str()) {
                return Err(PolicyError::DuplicateAccessType(
                    access_type.reference.clone(),
                ));
            }
        }
        Ok(())
    }
}
