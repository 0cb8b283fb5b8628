//! Already-parsed GNAP request and response messages.
//!
//! These are the object model the handler works on. No wire format is
//! mandated; the serde derives give the GNAP JSON shape for transports that
//! want it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::access::{AccessDescriptor, AccessToken, TokenFlag, TokenRequest};
use crate::key::ClientKey;
use crate::types::{ClientId, TokenValue};

/// How a caller identifies itself: by a previously issued reference, or by
/// presenting its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientInstance {
    Reference(ClientId),
    Key(ClientKey),
}

/// Interaction modes requested by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractRequest {
    /// Start modes, e.g. `"redirect"`.
    #[serde(default)]
    pub start: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish: Option<InteractFinish>,
}

/// How the client wants to be told the interaction finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractFinish {
    pub method: String,
    pub uri: String,
    pub nonce: String,
}

/// A grant request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub access_token: Vec<TokenRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientInstance>,
    #[serde(default)]
    pub interact: InteractRequest,
}

/// Interaction description returned to the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    /// Server nonce for the finish hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish: Option<String>,
}

/// Where and with what token the client continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinueResponse {
    pub uri: String,
    pub access_token: TokenValue,
}

/// Response to a grant request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessResponse {
    #[serde(rename = "continue")]
    pub continuation: ContinueResponse,
    pub interact: InteractResponse,
    pub instance_id: ClientId,
}

/// A continuation request after interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinueRequest {
    pub interact_ref: String,
}

/// Tokens issued by a continuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinueGrantResponse {
    pub access_token: Vec<AccessToken>,
}

/// The outcome of a completed login and consent interaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentResult {
    #[serde(default)]
    pub subject_data: BTreeMap<String, String>,
    #[serde(default)]
    pub tokens: Vec<TokenRequest>,
}

/// A resource server asking about someone else's access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectRequest {
    /// The presented token, exactly as received. Not parsed until lookup so
    /// malformed values fall into the same inactive outcome as unknown ones.
    pub access_token: String,
    /// Proof method the resource server saw the token presented with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_server: Option<ClientInstance>,
}

/// Introspection answer.
///
/// Inactive responses carry nothing but `active: false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectResponse {
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<Vec<AccessDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<ClientKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<BTreeSet<TokenFlag>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_data: Option<BTreeMap<String, String>>,
}

impl IntrospectResponse {
    /// The one inactive shape.
    pub fn inactive() -> Self {
        Self {
            active: false,
            access: None,
            key: None,
            flags: None,
            subject_data: None,
        }
    }

    /// An active response.
    pub fn active(
        access: Vec<AccessDescriptor>,
        key: ClientKey,
        flags: BTreeSet<TokenFlag>,
        subject_data: BTreeMap<String, String>,
    ) -> Self {
        Self {
            active: true,
            access: Some(access),
            key: Some(key),
            flags: Some(flags),
            subject_data: Some(subject_data),
        }
    }
}
