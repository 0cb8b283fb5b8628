//! In-memory implementation of the SessionStore trait.
//!
//! Same semantics as SQLite but nothing is persisted. One async `RwLock`
//! guards the session map and every secondary index, so each operation is a
//! single critical section and the indexes never disagree with the map.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use gnap_authz_core::{
    now_millis, AccessToken, ClientId, ClientKey, ContinueToken, KeyFingerprint, Session,
    TokenRequest, TokenValue,
};

use crate::error::{Result, StoreError};
use crate::traits::{ContinuationGrant, SessionLookup, SessionStore};

/// In-memory session store.
///
/// All data is lost when the store is dropped.
pub struct MemorySessionStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Sessions indexed by client id.
    sessions: HashMap<ClientId, Session>,

    /// Key fingerprint -> client id.
    by_key: HashMap<KeyFingerprint, ClientId>,

    /// Current continuation token value -> client id.
    by_continue: HashMap<TokenValue, ClientId>,

    /// Access token value -> client id.
    by_access: HashMap<TokenValue, ClientId>,
}

impl MemoryStoreInner {
    fn fresh_client_id(&self) -> ClientId {
        loop {
            let id = ClientId::generate();
            if !self.sessions.contains_key(&id) {
                return id;
            }
        }
    }

    fn install_continue_token(&mut self, token: ContinueToken, id: &ClientId) -> Result<()> {
        let session = self
            .sessions
            .get_mut(id)
            .ok_or(StoreError::SessionNotFound(*id))?;

        if let Some(previous) = session.continue_token.take() {
            self.by_continue.remove(&previous.value);
        }
        self.by_continue.insert(token.value, *id);
        session.continue_token = Some(token);
        Ok(())
    }
}

impl MemorySessionStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_by_id(&self, id: &ClientId) -> Result<Option<Session>> {
        let inner = self.inner.read().await;
        Ok(inner.sessions.get(id).cloned())
    }

    async fn get_by_key(&self, key: &ClientKey) -> Result<Option<Session>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_key
            .get(&key.fingerprint())
            .and_then(|id| inner.sessions.get(id))
            .cloned())
    }

    async fn get_or_create_by_key(&self, key: &ClientKey) -> Result<SessionLookup> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let fingerprint = key.fingerprint();

        if let Some(session) = inner
            .by_key
            .get(&fingerprint)
            .and_then(|id| inner.sessions.get(id))
        {
            return Ok(SessionLookup::Existing(session.clone()));
        }

        let id = inner.fresh_client_id();
        let session = Session::new(id, key.clone(), now_millis());
        inner.by_key.insert(fingerprint, id);
        inner.sessions.insert(id, session.clone());

        tracing::debug!(client_id = %id, key = %fingerprint, "created session");
        Ok(SessionLookup::Created(session))
    }

    async fn get_by_continue_token(&self, token: &TokenValue) -> Result<Option<Session>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_continue
            .get(token)
            .and_then(|id| inner.sessions.get(id))
            .filter(|s| s.has_continue_token(token))
            .cloned())
    }

    async fn get_by_access_token(
        &self,
        token: &TokenValue,
    ) -> Result<Option<(Session, AccessToken)>> {
        let inner = self.inner.read().await;
        let Some(session) = inner
            .by_access
            .get(token)
            .and_then(|id| inner.sessions.get(id))
        else {
            return Ok(None);
        };
        Ok(session
            .access_token(token)
            .cloned()
            .map(|t| (session.clone(), t)))
    }

    async fn session_count(&self) -> Result<usize> {
        Ok(self.inner.read().await.sessions.len())
    }

    async fn set_continue_token(&self, token: ContinueToken, id: &ClientId) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.install_continue_token(token, id)
    }

    async fn save_requests(&self, requests: Vec<TokenRequest>, id: &ClientId) -> Result<()> {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(id)
            .ok_or(StoreError::SessionNotFound(*id))?;
        session.pending_requests = requests;
        Ok(())
    }

    async fn save_subject_data(
        &self,
        data: BTreeMap<String, String>,
        id: &ClientId,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(id)
            .ok_or(StoreError::SessionNotFound(*id))?;
        session.merge_subject_data(data);
        Ok(())
    }

    async fn add_token(&self, token: AccessToken, id: &ClientId) -> Result<()> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        if inner.by_access.contains_key(&token.value) {
            return Err(StoreError::DuplicateToken);
        }
        let session = inner
            .sessions
            .get_mut(id)
            .ok_or(StoreError::SessionNotFound(*id))?;

        let value = token.value;
        session.access_tokens.push(token);
        inner.by_access.insert(value, *id);
        Ok(())
    }

    async fn revoke_access_token(&self, token: &TokenValue) -> Result<bool> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let Some(id) = inner.by_access.remove(token) else {
            return Ok(false);
        };
        if let Some(session) = inner.sessions.get_mut(&id) {
            session.access_tokens.retain(|t| &t.value != token);
        }
        Ok(true)
    }

    async fn begin_continuation(
        &self,
        token: ContinueToken,
        pending: Vec<TokenRequest>,
        id: &ClientId,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.install_continue_token(token, id)?;
        if let Some(session) = inner.sessions.get_mut(id) {
            session.pending_requests = pending;
        }
        Ok(())
    }

    async fn redeem_continuation(
        &self,
        token: &TokenValue,
        grant: ContinuationGrant,
        id: &ClientId,
    ) -> Result<Vec<AccessToken>> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        // Check every precondition before touching anything.
        let session = inner
            .sessions
            .get(id)
            .ok_or(StoreError::SessionNotFound(*id))?;
        if !session.has_continue_token(token) {
            return Err(StoreError::StaleContinuation(*id));
        }
        let mut grant = grant;
        grant.retain_requested(&session.pending_requests);
        let mut seen = HashSet::new();
        for minted in &grant.tokens {
            if inner.by_access.contains_key(&minted.value) || !seen.insert(minted.value) {
                return Err(StoreError::DuplicateToken);
            }
        }

        inner.by_continue.remove(token);
        for minted in &grant.tokens {
            inner.by_access.insert(minted.value, *id);
        }

        let session = inner
            .sessions
            .get_mut(id)
            .ok_or(StoreError::SessionNotFound(*id))?;
        session.continue_token = None;
        session.pending_requests.clear();
        session.merge_subject_data(grant.subject_data);
        session.access_tokens.extend(grant.tokens.iter().cloned());
        Ok(grant.tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use gnap_authz_core::{Keypair, ProofMethod};

    fn test_key() -> ClientKey {
        ClientKey::httpsig(Keypair::generate().public_key())
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent_per_key() {
        let store = MemorySessionStore::new();
        let key = test_key();

        let first = store.get_or_create_by_key(&key).await.unwrap();
        assert!(first.is_created());

        let second = store.get_or_create_by_key(&key).await.unwrap();
        assert!(!second.is_created());
        assert_eq!(first.session().client_id, second.session().client_id);
        assert_eq!(store.session_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_key_identity_ignores_proof_method() {
        let store = MemorySessionStore::new();
        let pk = Keypair::generate().public_key();

        let first = store
            .get_or_create_by_key(&ClientKey::new(pk, ProofMethod::HttpSig))
            .await
            .unwrap()
            .into_session();
        let second = store
            .get_or_create_by_key(&ClientKey::new(pk, ProofMethod::Jwsd))
            .await
            .unwrap()
            .into_session();

        assert_eq!(first.client_id, second.client_id);
        assert_eq!(second.client_key.proof, ProofMethod::HttpSig);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_or_create_yields_one_session() {
        let store = Arc::new(MemorySessionStore::new());
        let key = test_key();

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = Arc::clone(&store);
                let key = key.clone();
                tokio::spawn(async move { store.get_or_create_by_key(&key).await.unwrap() })
            })
            .collect();

        let mut ids = HashSet::new();
        let mut created = 0;
        for handle in handles {
            let lookup = handle.await.unwrap();
            if lookup.is_created() {
                created += 1;
            }
            ids.insert(lookup.into_session().client_id);
        }

        assert_eq!(created, 1);
        assert_eq!(ids.len(), 1);
        assert_eq!(store.session_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_new_continue_token_supersedes_old() {
        let store = MemorySessionStore::new();
        let session = store
            .get_or_create_by_key(&test_key())
            .await
            .unwrap()
            .into_session();

        let old = ContinueToken::issue(0);
        let new = ContinueToken::issue(1);
        store
            .set_continue_token(old.clone(), &session.client_id)
            .await
            .unwrap();
        store
            .set_continue_token(new.clone(), &session.client_id)
            .await
            .unwrap();

        assert!(store
            .get_by_continue_token(&old.value)
            .await
            .unwrap()
            .is_none());
        let found = store
            .get_by_continue_token(&new.value)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.client_id, session.client_id);
    }

    #[tokio::test]
    async fn test_mutations_on_unknown_session_fail() {
        let store = MemorySessionStore::new();
        let missing = ClientId::generate();

        let err = store
            .save_requests(vec![], &missing)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SessionNotFound(id) if id == missing));

        assert!(store.get_by_id(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_token_rejects_duplicate_across_sessions() {
        let store = MemorySessionStore::new();
        let a = store
            .get_or_create_by_key(&test_key())
            .await
            .unwrap()
            .into_session();
        let b = store
            .get_or_create_by_key(&test_key())
            .await
            .unwrap()
            .into_session();

        let token = AccessToken::mint(&TokenRequest::reference("read"), 0, None);
        store.add_token(token.clone(), &a.client_id).await.unwrap();

        let err = store.add_token(token, &b.client_id).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateToken));
    }

    #[tokio::test]
    async fn test_redeem_is_single_use_and_atomic() {
        let store = MemorySessionStore::new();
        let session = store
            .get_or_create_by_key(&test_key())
            .await
            .unwrap()
            .into_session();
        let id = session.client_id;

        let pending = vec![TokenRequest::reference("read-email")];
        let continue_token = ContinueToken::issue(0);
        store
            .begin_continuation(continue_token.clone(), pending.clone(), &id)
            .await
            .unwrap();

        let minted = AccessToken::mint(&pending[0], 0, None);
        let grant = ContinuationGrant {
            subject_data: BTreeMap::from([("email".into(), "a@b.com".into())]),
            tokens: vec![minted.clone()],
        };
        let issued = store
            .redeem_continuation(&continue_token.value, grant.clone(), &id)
            .await
            .unwrap();
        assert_eq!(issued, vec![minted.clone()]);

        let err = store
            .redeem_continuation(&continue_token.value, grant, &id)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StaleContinuation(_)));

        let stored = store.get_by_id(&id).await.unwrap().unwrap();
        assert!(stored.continue_token.is_none());
        assert!(stored.pending_requests.is_empty());
        assert_eq!(stored.access_tokens, vec![minted.clone()]);
        assert_eq!(stored.subject_data["email"], "a@b.com");

        let (owner, token) = store
            .get_by_access_token(&minted.value)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(owner.client_id, id);
        assert_eq!(token, minted);
    }

    #[tokio::test]
    async fn test_redeem_with_duplicate_token_commits_nothing() {
        let store = MemorySessionStore::new();
        let id = store
            .get_or_create_by_key(&test_key())
            .await
            .unwrap()
            .into_session()
            .client_id;

        let existing = AccessToken::mint(&TokenRequest::reference("a"), 0, None);
        store.add_token(existing.clone(), &id).await.unwrap();

        let continue_token = ContinueToken::issue(0);
        store
            .begin_continuation(
                continue_token.clone(),
                vec![TokenRequest::reference("b"), TokenRequest::reference("a")],
                &id,
            )
            .await
            .unwrap();

        let fresh = AccessToken::mint(&TokenRequest::reference("b"), 0, None);
        let grant = ContinuationGrant {
            subject_data: BTreeMap::from([("email".into(), "x".into())]),
            tokens: vec![fresh.clone(), existing],
        };
        let err = store
            .redeem_continuation(&continue_token.value, grant, &id)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateToken));

        let stored = store.get_by_id(&id).await.unwrap().unwrap();
        assert!(stored.has_continue_token(&continue_token.value));
        assert_eq!(stored.access_tokens.len(), 1);
        assert!(stored.subject_data.is_empty());
        assert!(store
            .get_by_access_token(&fresh.value)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_redeem_stores_only_pending_requests() {
        let store = MemorySessionStore::new();
        let id = store
            .get_or_create_by_key(&test_key())
            .await
            .unwrap()
            .into_session()
            .client_id;

        let email = TokenRequest::reference("read-email");
        let continue_token = ContinueToken::issue(0);
        store
            .begin_continuation(continue_token.clone(), vec![email.clone()], &id)
            .await
            .unwrap();

        let requested = AccessToken::mint(&email, 0, None);
        let unrequested = AccessToken::mint(&TokenRequest::reference("read-ssn"), 0, None);
        let repeated = AccessToken::mint(&email, 0, None);
        let grant = ContinuationGrant {
            subject_data: BTreeMap::new(),
            tokens: vec![requested.clone(), unrequested.clone(), repeated.clone()],
        };
        let issued = store
            .redeem_continuation(&continue_token.value, grant, &id)
            .await
            .unwrap();
        assert_eq!(issued, vec![requested.clone()]);

        let stored = store.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.access_tokens, vec![requested]);
        for dropped in [unrequested, repeated] {
            assert!(store
                .get_by_access_token(&dropped.value)
                .await
                .unwrap()
                .is_none());
        }
    }

    #[tokio::test]
    async fn test_revoke_access_token() {
        let store = MemorySessionStore::new();
        let id = store
            .get_or_create_by_key(&test_key())
            .await
            .unwrap()
            .into_session()
            .client_id;
        let token = AccessToken::mint(&TokenRequest::reference("a"), 0, None);
        store.add_token(token.clone(), &id).await.unwrap();

        assert!(store.revoke_access_token(&token.value).await.unwrap());
        assert!(!store.revoke_access_token(&token.value).await.unwrap());
        assert!(store
            .get_by_access_token(&token.value)
            .await
            .unwrap()
            .is_none());
    }
}
