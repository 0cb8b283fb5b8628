//! The access policy contract and its configuration-driven implementation.

use std::collections::{BTreeSet, HashMap};

use gnap_authz_core::{now_millis, AccessDescriptor, Session, TokenRequest};

use crate::config::{AccessType, Permission, PolicyConfig};
use crate::error::{PolicyError, Result};

/// Partition of requested tokens into those granted outright and those that
/// need the resource owner's consent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionDecision {
    pub granted: Vec<TokenRequest>,
    pub needs_consent: Vec<TokenRequest>,
}

impl PermissionDecision {
    /// Whether every requested token was granted outright.
    pub fn all_granted(&self) -> bool {
        self.needs_consent.is_empty()
    }
}

/// Decides which requested tokens need consent, and which subject attributes
/// a token's access allows to be disclosed.
pub trait AccessPolicy: Send + Sync {
    /// Partition `requested` for the given session.
    fn determine_permissions(
        &self,
        requested: &[TokenRequest],
        session: &Session,
    ) -> Result<PermissionDecision>;

    /// The subject attribute names the given access may disclose.
    fn allowed_subject_keys(&self, access: &[AccessDescriptor]) -> BTreeSet<String>;
}

/// An [`AccessPolicy`] driven by a [`PolicyConfig`].
///
/// A request is granted when each of its descriptors is either an
/// `always_grant` type or already held verbatim by one of the session's
/// unexpired tokens. Anything else needs consent. A descriptor naming an
/// unknown type fails the whole decision.
#[derive(Debug, Clone)]
pub struct ConfigPolicy {
    types: HashMap<String, AccessType>,
}

impl ConfigPolicy {
    /// Build a policy from a validated config.
    pub fn new(config: PolicyConfig) -> Result<Self> {
        config.validate()?;
        let types = config
            .access_types
            .into_iter()
            .map(|t| (t.reference.clone(), t))
            .collect();
        Ok(Self { types })
    }

    /// Parse a JSON policy document.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::new(PolicyConfig::from_json(json)?)
    }

    /// Look up the access type a descriptor names.
    pub fn access_type(&self, descriptor: &AccessDescriptor) -> Option<&AccessType> {
        self.types.get(descriptor.type_name())
    }

    fn is_granted(&self, request: &TokenRequest, session: &Session, now: i64) -> Result<bool> {
        let mut granted = true;
        for descriptor in &request.access {
            let access_type = self
                .access_type(descriptor)
                .ok_or_else(|| PolicyError::UnknownAccessType(descriptor.type_name().into()))?;

            let held = session.live_tokens(now).any(|t| t.grants(descriptor));
            if access_type.permission == Permission::NeedsConsent && !held {
                granted = false;
            }
        }
        Ok(granted)
    }
}

impl AccessPolicy for ConfigPolicy {
    fn determine_permissions(
        &self,
        requested: &[TokenRequest],
        session: &Session,
    ) -> Result<PermissionDecision> {
        let now = now_millis();
        let mut decision = PermissionDecision::default();

        for request in requested {
            if self.is_granted(request, session, now)? {
                decision.granted.push(request.clone());
            } else {
                decision.needs_consent.push(request.clone());
            }
        }

        tracing::debug!(
            client_id = %session.client_id,
            granted = decision.granted.len(),
            needs_consent = decision.needs_consent.len(),
            "determined permissions"
        );
        Ok(decision)
    }

    fn allowed_subject_keys(&self, access: &[AccessDescriptor]) -> BTreeSet<String> {
        access
            .iter()
            .filter_map(|d| self.access_type(d))
            .flat_map(|t| t.subject_keys.iter().cloned())
            .collect()
    }
}
