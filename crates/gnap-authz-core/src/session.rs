//! The session: authoritative record for one client or resource server.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::access::{AccessToken, TokenRequest};
use crate::key::ClientKey;
use crate::types::{ClientId, TokenValue};

/// A continuation token bound to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinueToken {
    pub value: TokenValue,
    /// Issue time (Unix ms).
    pub issued_at: i64,
}

impl ContinueToken {
    /// Issue a fresh continuation token.
    pub fn issue(now: i64) -> Self {
        Self {
            value: TokenValue::generate(),
            issued_at: now,
        }
    }

    /// Whether the token is older than `ttl_ms` at `now`.
    pub fn is_expired(&self, now: i64, ttl_ms: i64) -> bool {
        now.saturating_sub(self.issued_at) >= ttl_ms
    }
}

/// State kept about one client instance or resource-server instance.
///
/// A session is addressable by its `client_id`, by its key, by its current
/// continuation token, or by any of its access tokens. Stores keep those
/// indexes consistent; this type is the plain record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub client_id: ClientId,
    pub client_key: ClientKey,
    /// At most one live continuation token.
    pub continue_token: Option<ContinueToken>,
    /// Issued access tokens, in issue order.
    pub access_tokens: Vec<AccessToken>,
    /// Requests awaiting consent.
    pub pending_requests: Vec<TokenRequest>,
    /// Subject attributes disclosed to this session.
    pub subject_data: BTreeMap<String, String>,
    /// Creation time (Unix ms).
    pub created_at: i64,
}

impl Session {
    /// A fresh session with nothing but an identity and a key.
    pub fn new(client_id: ClientId, client_key: ClientKey, now: i64) -> Self {
        Self {
            client_id,
            client_key,
            continue_token: None,
            access_tokens: Vec::new(),
            pending_requests: Vec::new(),
            subject_data: BTreeMap::new(),
            created_at: now,
        }
    }

    /// Find one of this session's access tokens by value.
    pub fn access_token(&self, value: &TokenValue) -> Option<&AccessToken> {
        self.access_tokens.iter().find(|t| &t.value == value)
    }

    /// Whether `value` is this session's current continuation token.
    pub fn has_continue_token(&self, value: &TokenValue) -> bool {
        matches!(&self.continue_token, Some(t) if &t.value == value)
    }

    /// Tokens that have not expired at `now`.
    pub fn live_tokens(&self, now: i64) -> impl Iterator<Item = &AccessToken> {
        self.access_tokens.iter().filter(move |t| !t.is_expired(now))
    }

    /// Merge disclosed subject attributes: given keys overwrite, the rest stay.
    pub fn merge_subject_data(&mut self, data: BTreeMap<String, String>) {
        self.subject_data.extend(data);
    }
}
