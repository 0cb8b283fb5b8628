//! SessionStore trait: the abstract interface for session persistence.
//!
//! The protocol handler is storage-agnostic. Implementations include an
//! in-memory store and SQLite.

use std::collections::BTreeMap;

use async_trait::async_trait;
use gnap_authz_core::{
    AccessToken, ClientId, ClientKey, ContinueToken, Session, TokenRequest, TokenValue,
};

use crate::error::Result;

/// Result of a get-or-create lookup by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLookup {
    /// A session was already bound to the key.
    Existing(Session),
    /// No session was bound to the key; this one was just created.
    Created(Session),
}

impl SessionLookup {
    /// Whether the session was created by this call.
    pub fn is_created(&self) -> bool {
        matches!(self, SessionLookup::Created(_))
    }

    /// The session, however it was obtained.
    pub fn session(&self) -> &Session {
        match self {
            SessionLookup::Existing(s) | SessionLookup::Created(s) => s,
        }
    }

    /// Take the session.
    pub fn into_session(self) -> Session {
        match self {
            SessionLookup::Existing(s) | SessionLookup::Created(s) => s,
        }
    }
}

/// Everything a successful continuation commits at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContinuationGrant {
    /// Subject attributes to merge into the session.
    pub subject_data: BTreeMap<String, String>,
    /// Freshly minted tokens to append, in order.
    pub tokens: Vec<AccessToken>,
}

impl ContinuationGrant {
    /// Keep only the tokens that answer a pending request, in order.
    ///
    /// Each pending request is answered by at most one token. Returns how
    /// many tokens were dropped.
    pub fn retain_requested(&mut self, pending: &[TokenRequest]) -> usize {
        let before = self.tokens.len();
        let mut open: Vec<&TokenRequest> = pending.iter().collect();
        self.tokens
            .retain(|token| match open.iter().position(|r| token.answers(r)) {
                Some(i) => {
                    open.swap_remove(i);
                    true
                }
                None => false,
            });
        before - self.tokens.len()
    }
}

/// The SessionStore trait: async interface for session persistence.
///
/// # Design Notes
///
/// - **Internal locking**: every method is safe to call concurrently; callers
///   never hold a lock across calls.
/// - **NotFound is not an error**: lookups return `Ok(None)` for unknown keys,
///   reference ids, and tokens. `Err` always means the store itself failed.
/// - **Uniqueness**: client ids, key fingerprints, continuation token values,
///   and access token values are each unique across the whole store.
/// - **Atomic get-or-create**: concurrent first sightings of one key create
///   exactly one session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Lookups
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a session by its client id.
    async fn get_by_id(&self, id: &ClientId) -> Result<Option<Session>>;

    /// Get the session bound to an equal key, without creating one.
    async fn get_by_key(&self, key: &ClientKey) -> Result<Option<Session>>;

    /// Get the session bound to an equal key, or atomically create one with a
    /// fresh client id.
    async fn get_or_create_by_key(&self, key: &ClientKey) -> Result<SessionLookup>;

    /// Get the session whose current continuation token has this value.
    ///
    /// Superseded and redeemed values resolve to `None`.
    async fn get_by_continue_token(&self, token: &TokenValue) -> Result<Option<Session>>;

    /// Get the session owning an access token, along with the token.
    async fn get_by_access_token(
        &self,
        token: &TokenValue,
    ) -> Result<Option<(Session, AccessToken)>>;

    /// Number of sessions in the store.
    async fn session_count(&self) -> Result<usize>;

    // ─────────────────────────────────────────────────────────────────────────
    // Single-field mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the session's continuation token, invalidating the previous one.
    async fn set_continue_token(&self, token: ContinueToken, id: &ClientId) -> Result<()>;

    /// Replace the session's pending requests.
    async fn save_requests(&self, requests: Vec<TokenRequest>, id: &ClientId) -> Result<()>;

    /// Merge subject attributes into the session. Given keys overwrite; other
    /// keys are kept.
    async fn save_subject_data(&self, data: BTreeMap<String, String>, id: &ClientId)
        -> Result<()>;

    /// Append an access token. Fails with `DuplicateToken` if the value is
    /// already issued anywhere in the store.
    async fn add_token(&self, token: AccessToken, id: &ClientId) -> Result<()>;

    /// Remove an access token wherever it lives. Returns whether it existed.
    async fn revoke_access_token(&self, token: &TokenValue) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Compound mutations (one atomic update each)
    // ─────────────────────────────────────────────────────────────────────────

    /// Install a new continuation token together with the pending requests it
    /// will resume. No reader observes one without the other.
    async fn begin_continuation(
        &self,
        token: ContinueToken,
        pending: Vec<TokenRequest>,
        id: &ClientId,
    ) -> Result<()>;

    /// Redeem the session's continuation token.
    ///
    /// Atomically checks `token` is still current (else `StaleContinuation`),
    /// clears it, takes the pending requests, merges the grant's subject data,
    /// and appends the grant's tokens that answer a pending request (see
    /// [`ContinuationGrant::retain_requested`]). Tokens for anything not
    /// pending are never stored. Either everything is committed or nothing
    /// is. Returns the tokens that were committed, in order.
    async fn redeem_continuation(
        &self,
        token: &TokenValue,
        grant: ContinuationGrant,
        id: &ClientId,
    ) -> Result<Vec<AccessToken>>;
}
