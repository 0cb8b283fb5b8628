//! Access descriptors, token requests, and issued access tokens.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::TokenValue;

/// One unit of requested or granted access.
///
/// GNAP allows either a bare reference string naming a pre-arranged access
/// type, or a structured object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccessDescriptor {
    /// A pre-arranged access type, by name.
    Reference(String),
    /// A structured access description.
    Item(AccessItem),
}

impl AccessDescriptor {
    /// Shorthand for a reference descriptor.
    pub fn reference(name: impl Into<String>) -> Self {
        AccessDescriptor::Reference(name.into())
    }

    /// The access type this descriptor names: the reference itself, or the
    /// `type` of a structured item.
    pub fn type_name(&self) -> &str {
        match self {
            AccessDescriptor::Reference(name) => name,
            AccessDescriptor::Item(item) => &item.kind,
        }
    }
}

/// Structured access description.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub datatypes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

impl AccessItem {
    /// An item of the given type with no further constraints.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            actions: Vec::new(),
            locations: Vec::new(),
            datatypes: Vec::new(),
            identifier: None,
        }
    }

    /// Add an allowed action.
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }
}

/// Token metadata flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenFlag {
    /// Not bound to a key; usable by whoever presents it.
    Bearer,
    /// Survives rotation of the grant.
    Durable,
}

/// One requested access token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRequest {
    pub access: Vec<AccessDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub flags: BTreeSet<TokenFlag>,
}

impl TokenRequest {
    /// A request for the given access with no label or flags.
    pub fn new(access: Vec<AccessDescriptor>) -> Self {
        Self {
            access,
            label: None,
            flags: BTreeSet::new(),
        }
    }

    /// A request for a single reference access type.
    pub fn reference(name: impl Into<String>) -> Self {
        Self::new(vec![AccessDescriptor::reference(name)])
    }

    /// Set the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add a flag.
    pub fn with_flag(mut self, flag: TokenFlag) -> Self {
        self.flags.insert(flag);
        self
    }
}

/// An access token issued to a session after consent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub value: TokenValue,
    pub access: Vec<AccessDescriptor>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub flags: BTreeSet<TokenFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Issue time (Unix ms).
    pub issued_at: i64,
    /// Expiry (Unix ms); `None` never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl AccessToken {
    /// Mint a token for a consented request with a fresh random value.
    pub fn mint(request: &TokenRequest, now: i64, lifetime_ms: Option<i64>) -> Self {
        Self {
            value: TokenValue::generate(),
            access: request.access.clone(),
            flags: request.flags.clone(),
            label: request.label.clone(),
            issued_at: now,
            expires_at: lifetime_ms.map(|ms| now.saturating_add(ms)),
        }
    }

    /// Whether the token has expired at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }

    /// Whether this token was minted for exactly `request`: same access,
    /// flags, and label.
    pub fn answers(&self, request: &TokenRequest) -> bool {
        self.access == request.access && self.flags == request.flags && self.label == request.label
    }

    /// Whether this token grants the given descriptor verbatim.
    pub fn grants(&self, descriptor: &AccessDescriptor) -> bool {
        self.access.iter().any(|a| a == descriptor)
    }
}
