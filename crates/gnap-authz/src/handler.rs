//! The AuthHandler: GNAP grant, continuation, and introspection flows.
//!
//! The handler owns no state of its own beyond shared handles to the store
//! and its collaborators. Every method takes `&self` and may run concurrently
//! with any other; the store provides all mutual exclusion.

use std::collections::BTreeMap;
use std::sync::Arc;

use gnap_authz_core::{
    now_millis, AccessRequest, AccessResponse, AccessToken, ClientInstance, ContinueGrantResponse,
    ContinueRequest, ContinueResponse, ContinueToken, IntrospectRequest, IntrospectResponse,
    ProofMethod, Session, TokenValue,
};
use gnap_authz_policy::AccessPolicy;
use gnap_authz_store::{ContinuationGrant, SessionStore, StoreError};

use crate::config::{HandlerConfig, KeyPolicy};
use crate::error::{AuthError, Result};
use crate::interaction::InteractionHandler;
use crate::verifier::RequestVerifier;

/// Why an introspected token is reported inactive.
///
/// Never disclosed to the resource server; every reason produces the same
/// `{"active": false}` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InactiveReason {
    /// The presented value is not a well-formed token.
    Malformed,
    /// No session holds a token with this value.
    Unknown,
    /// The token exists but its lifetime has passed.
    Expired,
    /// The store could not answer.
    StoreUnavailable,
}

/// Outcome of resolving a presented access token.
#[derive(Debug, Clone)]
pub enum TokenLookup {
    /// The token is live and owned by `session`.
    Found { session: Session, token: AccessToken },
    /// The token cannot be treated as active.
    Inactive(InactiveReason),
}

/// The protocol handler.
///
/// Holds:
/// - The session store
/// - The access policy
/// - The login and consent interaction handler
pub struct AuthHandler<S: SessionStore> {
    store: Arc<S>,
    policy: Arc<dyn AccessPolicy>,
    interaction: Arc<dyn InteractionHandler>,
    config: HandlerConfig,
}

impl<S: SessionStore> Clone for AuthHandler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: Arc::clone(&self.policy),
            interaction: Arc::clone(&self.interaction),
            config: self.config.clone(),
        }
    }
}

impl<S: SessionStore> AuthHandler<S> {
    /// Create a new handler.
    pub fn new(
        store: Arc<S>,
        policy: Arc<dyn AccessPolicy>,
        interaction: Arc<dyn InteractionHandler>,
        config: HandlerConfig,
    ) -> Self {
        Self {
            store,
            policy,
            interaction,
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the configuration.
    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Grant Requests
    // ─────────────────────────────────────────────────────────────────────────

    /// Handle a GNAP grant request.
    ///
    /// Resolves or creates the client's session, checks proof of possession,
    /// splits the requested tokens with the access policy, and starts a
    /// continuation holding the requests that need consent. Any previous
    /// continuation of the session is superseded.
    ///
    /// Requests the policy grants outright are not stored and are never
    /// issued: only the needs-consent set can be redeemed at continuation.
    /// A request with no access tokens still starts a continuation, for
    /// clients asking only for subject information.
    pub async fn handle_access_request(
        &self,
        request: &AccessRequest,
        verifier: &dyn RequestVerifier,
    ) -> Result<AccessResponse> {
        let client = request
            .client
            .as_ref()
            .ok_or_else(|| AuthError::malformed("missing client"))?;

        let session = self
            .resolve_session(client, self.config.client_key_policy, verifier)
            .await?;
        let client_id = session.client_id;

        let decision = self
            .policy
            .determine_permissions(&request.access_token, &session)?;

        let continue_token = ContinueToken::issue(now_millis());
        let pending = decision.needs_consent.len();
        if !decision.granted.is_empty() {
            tracing::debug!(
                client_id = %client_id,
                granted = decision.granted.len(),
                "outright grants not issued"
            );
        }
        self.store
            .begin_continuation(continue_token.clone(), decision.needs_consent, &client_id)
            .await?;

        let interact = self
            .interaction
            .prepare_interaction(&request.interact)
            .await?;

        tracing::info!(
            client_id = %client_id,
            continue_token = %continue_token.value,
            pending,
            "started continuation"
        );

        Ok(AccessResponse {
            continuation: ContinueResponse {
                uri: self.config.continue_uri.clone(),
                access_token: continue_token.value,
            },
            interact,
            instance_id: client_id,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Continuation
    // ─────────────────────────────────────────────────────────────────────────

    /// Handle a continuation request presenting `continue_token`.
    ///
    /// Fetches the consent result for the interaction and, in one store
    /// update, consumes the continuation, records the disclosed subject data,
    /// and issues one access token per consented request that was pending.
    /// Consented requests that were never pending are dropped. A
    /// continuation token can be redeemed once.
    pub async fn handle_continue_request(
        &self,
        request: &ContinueRequest,
        continue_token: &str,
        verifier: &dyn RequestVerifier,
    ) -> Result<ContinueGrantResponse> {
        let value =
            TokenValue::from_hex(continue_token).map_err(|_| AuthError::UnknownContinuation)?;

        let session = self
            .store
            .get_by_continue_token(&value)
            .await?
            .ok_or(AuthError::UnknownContinuation)?;
        let client_id = session.client_id;

        if let Some(ttl) = self.config.continue_token_ttl_ms() {
            let expired = session
                .continue_token
                .as_ref()
                .is_some_and(|t| t.is_expired(now_millis(), ttl));
            if expired {
                tracing::debug!(client_id = %client_id, "continuation token expired");
                return Err(AuthError::UnknownContinuation);
            }
        }

        verifier.verify(&session.client_key).map_err(|e| {
            tracing::warn!(client_id = %client_id, error = %e, "continuation verification failed");
            e
        })?;

        let consent = self
            .interaction
            .query_interaction(&request.interact_ref)
            .await?;

        let now = now_millis();
        let lifetime = self.config.access_token_ttl_ms();
        let grant = ContinuationGrant {
            subject_data: consent.subject_data,
            tokens: consent
                .tokens
                .iter()
                .map(|r| AccessToken::mint(r, now, lifetime))
                .collect(),
        };
        let consented = grant.tokens.len();
        let tokens = match self.store.redeem_continuation(&value, grant, &client_id).await {
            Ok(tokens) => tokens,
            Err(StoreError::StaleContinuation(_)) => {
                tracing::debug!(client_id = %client_id, "continuation already redeemed");
                return Err(AuthError::UnknownContinuation);
            }
            Err(e) => return Err(e.into()),
        };

        if tokens.len() < consented {
            tracing::warn!(
                client_id = %client_id,
                dropped = consented - tokens.len(),
                "consent named access that was not pending"
            );
        }
        tracing::info!(
            client_id = %client_id,
            issued = tokens.len(),
            "redeemed continuation"
        );

        Ok(ContinueGrantResponse {
            access_token: tokens,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Introspection
    // ─────────────────────────────────────────────────────────────────────────

    /// Handle a resource server's introspection request.
    ///
    /// Only failures about the resource server itself are errors. Anything
    /// wrong with the introspected token yields the inactive response.
    pub async fn handle_introspection(
        &self,
        request: &IntrospectRequest,
        verifier: &dyn RequestVerifier,
    ) -> Result<IntrospectResponse> {
        let resource_server = request
            .resource_server
            .as_ref()
            .ok_or_else(|| AuthError::malformed("missing resource server"))?;

        let rs_session = self
            .resolve_session(
                resource_server,
                self.config.resource_server_key_policy,
                verifier,
            )
            .await?;

        let (session, token) = match self.lookup_token(&request.access_token).await {
            TokenLookup::Found { session, token } => (session, token),
            TokenLookup::Inactive(reason) => {
                tracing::debug!(rs = %rs_session.client_id, ?reason, "introspected token inactive");
                return Ok(IntrospectResponse::inactive());
            }
        };

        if let Some(proof) = request.proof.as_deref().filter(|p| !p.is_empty()) {
            if ProofMethod::from(proof) != session.client_key.proof {
                tracing::debug!(
                    rs = %rs_session.client_id,
                    presented = proof,
                    "introspected token proof mismatch"
                );
                return Ok(IntrospectResponse::inactive());
            }
        }

        let allowed = self.policy.allowed_subject_keys(&token.access);
        let subject_data: BTreeMap<String, String> = allowed
            .into_iter()
            .filter_map(|k| session.subject_data.get(&k).cloned().map(|v| (k, v)))
            .collect();

        tracing::debug!(
            rs = %rs_session.client_id,
            client_id = %session.client_id,
            token = %token.value,
            disclosed = subject_data.len(),
            "introspected active token"
        );

        Ok(IntrospectResponse::active(
            token.access,
            session.client_key,
            token.flags,
            subject_data,
        ))
    }

    /// Resolve a presented access token to its owning session.
    ///
    /// Never fails: malformed, unknown, and expired tokens, and store
    /// failures, all come back as [`TokenLookup::Inactive`].
    pub async fn lookup_token(&self, presented: &str) -> TokenLookup {
        let Ok(value) = TokenValue::from_hex(presented) else {
            return TokenLookup::Inactive(InactiveReason::Malformed);
        };

        match self.store.get_by_access_token(&value).await {
            Ok(Some((_, token))) if token.is_expired(now_millis()) => {
                TokenLookup::Inactive(InactiveReason::Expired)
            }
            Ok(Some((session, token))) => TokenLookup::Found { session, token },
            Ok(None) => TokenLookup::Inactive(InactiveReason::Unknown),
            Err(e) => {
                tracing::warn!(error = %e, "access token lookup failed");
                TokenLookup::Inactive(InactiveReason::StoreUnavailable)
            }
        }
    }

    /// Revoke an issued access token. Returns whether it existed.
    pub async fn revoke_access_token(&self, token: &TokenValue) -> Result<bool> {
        let revoked = self.store.revoke_access_token(token).await?;
        if revoked {
            tracing::info!(token = %token, "revoked access token");
        }
        Ok(revoked)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Find the session for a presented instance and check proof of
    /// possession against its bound key.
    ///
    /// An unseen key must verify before trust-on-first-use creates a session
    /// for it, so a failed verification never leaves a session behind.
    async fn resolve_session(
        &self,
        instance: &ClientInstance,
        key_policy: KeyPolicy,
        verifier: &dyn RequestVerifier,
    ) -> Result<Session> {
        let session = match instance {
            ClientInstance::Reference(id) => self
                .store
                .get_by_id(id)
                .await?
                .ok_or(AuthError::UnknownClient)?,
            ClientInstance::Key(key) => match self.store.get_by_key(key).await? {
                Some(session) => session,
                None if key_policy == KeyPolicy::TrustOnFirstUse => {
                    verifier.verify(key)?;
                    let lookup = self.store.get_or_create_by_key(key).await?;
                    if lookup.is_created() {
                        tracing::info!(
                            client_id = %lookup.session().client_id,
                            key = %key.fingerprint(),
                            "trusted new key on first use"
                        );
                    }
                    lookup.into_session()
                }
                None => {
                    tracing::debug!(key = %key.fingerprint(), "rejected unregistered key");
                    return Err(AuthError::UnknownClient);
                }
            },
        };

        verifier.verify(&session.client_key).map_err(|e| {
            tracing::warn!(client_id = %session.client_id, error = %e, "request verification failed");
            e
        })?;

        Ok(session)
    }
}
