//! Test fixtures and stub collaborators.
//!
//! Common setup code for integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use gnap_authz::{
    AuthHandler, HandlerConfig, InteractionError, InteractionHandler, RequestVerifier,
    SignedRequestVerifier, VerifyError,
};
use gnap_authz_core::{
    AccessRequest, AccessResponse, ClientInstance, ClientKey, ConsentResult,
    ContinueGrantResponse, ContinueRequest, Ed25519PublicKey, InteractRequest, InteractResponse,
    IntrospectRequest, Keypair, ProofMethod, TokenRequest,
};
use gnap_authz_policy::ConfigPolicy;
use gnap_authz_store::{MemorySessionStore, SessionStore};

/// Signing input every [`TestClient`] signs.
pub const TEST_MESSAGE: &[u8] = b"POST /gnap HTTP/1.1";

/// The policy used by [`TestFixture`].
///
/// `ping` is granted outright; everything else needs consent. `read-email`
/// discloses only `email`, `read-ssn` only `ssn`.
pub const DEFAULT_POLICY: &str = r#"{
    "access_types": [
        {"reference": "read-email",   "permission": "needs_consent", "subject_keys": ["email"]},
        {"reference": "read-profile", "permission": "needs_consent", "subject_keys": ["name", "email"]},
        {"reference": "read-ssn",     "permission": "needs_consent", "subject_keys": ["ssn"]},
        {"reference": "photo-api",    "permission": "needs_consent"},
        {"reference": "ping",         "permission": "always_grant"}
    ]
}"#;

/// A client instance or resource server with its own keypair.
#[derive(Debug, Clone)]
pub struct TestClient {
    pub keypair: Keypair,
    pub key: ClientKey,
}

impl TestClient {
    /// A client with a random keypair bound by HTTP signatures.
    pub fn new() -> Self {
        Self::with_keypair(Keypair::generate(), ProofMethod::HttpSig)
    }

    /// A client with a deterministic keypair.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self::with_keypair(Keypair::from_seed(&seed), ProofMethod::HttpSig)
    }

    /// A client bound with the given proof method.
    pub fn with_proof(proof: ProofMethod) -> Self {
        Self::with_keypair(Keypair::generate(), proof)
    }

    fn with_keypair(keypair: Keypair, proof: ProofMethod) -> Self {
        let key = ClientKey::new(keypair.public_key(), proof);
        Self { keypair, key }
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    /// Present this client by key.
    pub fn instance(&self) -> ClientInstance {
        ClientInstance::Key(self.key.clone())
    }

    /// A verifier for a request this client signed.
    pub fn verifier(&self) -> SignedRequestVerifier {
        SignedRequestVerifier::new(TEST_MESSAGE.to_vec(), self.keypair.sign(TEST_MESSAGE))
    }

    /// A grant request for the given tokens, presenting this client by key.
    pub fn access_request(&self, tokens: Vec<TokenRequest>) -> AccessRequest {
        AccessRequest {
            access_token: tokens,
            client: Some(self.instance()),
            interact: InteractRequest {
                start: vec!["redirect".into()],
                finish: None,
            },
        }
    }

    /// An introspection request for `token`, from this client acting as a
    /// resource server.
    pub fn introspect_request(&self, token: &str) -> IntrospectRequest {
        IntrospectRequest {
            access_token: token.to_string(),
            proof: None,
            resource_server: Some(self.instance()),
        }
    }
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}

/// A verifier with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub enum StaticVerifier {
    Accept,
    Reject,
}

impl RequestVerifier for StaticVerifier {
    fn verify(&self, _key: &ClientKey) -> Result<(), VerifyError> {
        match self {
            StaticVerifier::Accept => Ok(()),
            StaticVerifier::Reject => Err(VerifyError::Rejected("static verifier".into())),
        }
    }
}

#[derive(Debug, Clone)]
enum Outcome {
    Consented(ConsentResult),
    Denied,
}

/// An in-memory interaction handler.
///
/// Each prepared interaction gets a numbered redirect. Tests record consent
/// outcomes under an interaction reference before continuing.
#[derive(Debug, Default)]
pub struct MemoryInteraction {
    outcomes: Mutex<HashMap<String, Outcome>>,
    prepared: AtomicU64,
}

impl MemoryInteraction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the resource owner consented under `interact_ref`.
    pub async fn consent(&self, interact_ref: impl Into<String>, result: ConsentResult) {
        self.outcomes
            .lock()
            .await
            .insert(interact_ref.into(), Outcome::Consented(result));
    }

    /// Record that the resource owner refused under `interact_ref`.
    pub async fn deny(&self, interact_ref: impl Into<String>) {
        self.outcomes
            .lock()
            .await
            .insert(interact_ref.into(), Outcome::Denied);
    }

    /// Number of interactions prepared so far.
    pub fn prepared(&self) -> u64 {
        self.prepared.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InteractionHandler for MemoryInteraction {
    async fn prepare_interaction(
        &self,
        request: &InteractRequest,
    ) -> Result<InteractResponse, InteractionError> {
        let n = self.prepared.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(InteractResponse {
            redirect: request
                .start
                .iter()
                .any(|m| m == "redirect")
                .then(|| format!("https://auth.example/interact/{}", n)),
            finish: request.finish.as_ref().map(|_| format!("nonce-{}", n)),
        })
    }

    async fn query_interaction(&self, interact_ref: &str) -> Result<ConsentResult, InteractionError> {
        match self.outcomes.lock().await.get(interact_ref) {
            Some(Outcome::Consented(result)) => Ok(result.clone()),
            Some(Outcome::Denied) => Err(InteractionError::Denied),
            None => Err(InteractionError::UnknownReference(interact_ref.to_string())),
        }
    }
}

/// A handler wired to a store, [`DEFAULT_POLICY`], and a
/// [`MemoryInteraction`].
pub struct TestFixture<S: SessionStore = MemorySessionStore> {
    pub store: Arc<S>,
    pub interaction: Arc<MemoryInteraction>,
    pub handler: AuthHandler<S>,
}

impl TestFixture {
    /// A fixture over a fresh in-memory store with default configuration.
    pub fn new() -> Self {
        Self::with_config(HandlerConfig::default())
    }

    /// A fixture over a fresh in-memory store.
    pub fn with_config(config: HandlerConfig) -> Self {
        Self::with_store(MemorySessionStore::new(), config)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SessionStore + 'static> TestFixture<S> {
    /// A fixture over the given store.
    pub fn with_store(store: S, config: HandlerConfig) -> Self {
        let store = Arc::new(store);
        let interaction = Arc::new(MemoryInteraction::new());
        let policy = match ConfigPolicy::from_json(DEFAULT_POLICY) {
            Ok(policy) => policy,
            Err(e) => panic!("default policy must parse: {}", e),
        };
        let handler = AuthHandler::new(
            Arc::clone(&store),
            Arc::new(policy),
            Arc::clone(&interaction) as Arc<dyn InteractionHandler>,
            config,
        );
        Self {
            store,
            interaction,
            handler,
        }
    }

    /// Run a full grant: access request, consent under `interact_ref`, and
    /// continuation, all signed by `client`.
    pub async fn grant(
        &self,
        client: &TestClient,
        requests: Vec<TokenRequest>,
        interact_ref: &str,
        consent: ConsentResult,
    ) -> gnap_authz::Result<(AccessResponse, ContinueGrantResponse)> {
        let verifier = client.verifier();
        let response = self
            .handler
            .handle_access_request(&client.access_request(requests), &verifier)
            .await?;

        self.interaction.consent(interact_ref, consent).await;

        let grant = self
            .handler
            .handle_continue_request(
                &ContinueRequest {
                    interact_ref: interact_ref.to_string(),
                },
                &response.continuation.access_token.to_hex(),
                &verifier,
            )
            .await?;

        Ok((response, grant))
    }
}

/// Create multiple clients with distinct deterministic keys.
pub fn multi_party_clients(count: usize) -> Vec<TestClient> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[..8].copy_from_slice(&(i as u64).to_le_bytes());
            TestClient::with_seed(seed)
        })
        .collect()
}
