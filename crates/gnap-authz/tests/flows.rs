//! Grant and continuation flows end to end.

use std::time::Duration;

use gnap_authz::core::{ClientId, ConsentResult, ContinueRequest, TokenRequest};
use gnap_authz::store::{SessionStore, SqliteSessionStore};
use gnap_authz::{AuthError, ErrorKind, HandlerConfig, KeyPolicy};
use gnap_authz::{AccessRequest, ClientInstance, InteractRequest};
use gnap_authz_testkit::{StaticVerifier, TestClient, TestFixture};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn email_consent() -> ConsentResult {
    ConsentResult {
        subject_data: [("email".to_string(), "ann@example.com".to_string())].into(),
        tokens: vec![TokenRequest::reference("read-email")],
    }
}

fn continue_request(interact_ref: &str) -> ContinueRequest {
    ContinueRequest {
        interact_ref: interact_ref.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Grant requests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_new_key_creates_session_with_continuation() {
    init_tracing();
    let fixture = TestFixture::new();
    let client = TestClient::new();

    let request = client.access_request(vec![
        TokenRequest::reference("ping"),
        TokenRequest::reference("read-email"),
    ]);
    let response = fixture
        .handler
        .handle_access_request(&request, &client.verifier())
        .await
        .unwrap();

    assert_eq!(response.continuation.uri, "/gnap/continue");
    assert!(response.interact.redirect.is_some());
    assert_eq!(fixture.store.session_count().await.unwrap(), 1);

    let session = fixture
        .store
        .get_by_id(&response.instance_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.client_key, client.key);
    assert!(session.has_continue_token(&response.continuation.access_token));
    assert_eq!(
        session.pending_requests,
        vec![TokenRequest::reference("read-email")]
    );
    assert!(session.access_tokens.is_empty());
}

#[tokio::test]
async fn test_missing_client_is_malformed_and_creates_nothing() {
    let fixture = TestFixture::new();
    let request = AccessRequest {
        access_token: vec![TokenRequest::reference("read-email")],
        client: None,
        interact: InteractRequest::default(),
    };

    let err = fixture
        .handler
        .handle_access_request(&request, &StaticVerifier::Accept)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Malformed);
    assert_eq!(fixture.store.session_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_subject_only_request_starts_continuation() {
    let fixture = TestFixture::new();
    let client = TestClient::new();

    let (response, grant) = fixture
        .grant(
            &client,
            vec![],
            "ref-1",
            ConsentResult {
                subject_data: [("email".to_string(), "ann@example.com".to_string())].into(),
                tokens: vec![],
            },
        )
        .await
        .unwrap();

    assert!(grant.access_token.is_empty());
    let session = fixture
        .store
        .get_by_id(&response.instance_id)
        .await
        .unwrap()
        .unwrap();
    assert!(session.continue_token.is_none());
    assert_eq!(session.subject_data["email"], "ann@example.com");
}

#[tokio::test]
async fn test_outright_grants_are_not_issued() {
    let fixture = TestFixture::new();
    let client = TestClient::new();

    let (response, grant) = fixture
        .grant(
            &client,
            vec![TokenRequest::reference("ping")],
            "ref-1",
            ConsentResult {
                subject_data: Default::default(),
                tokens: vec![TokenRequest::reference("ping")],
            },
        )
        .await
        .unwrap();

    assert!(grant.access_token.is_empty());
    let session = fixture
        .store
        .get_by_id(&response.instance_id)
        .await
        .unwrap()
        .unwrap();
    assert!(session.access_tokens.is_empty());
}

#[tokio::test]
async fn test_unknown_reference_is_not_found() {
    let fixture = TestFixture::new();
    let request = AccessRequest {
        access_token: vec![TokenRequest::reference("read-email")],
        client: Some(ClientInstance::Reference(ClientId::generate())),
        interact: InteractRequest::default(),
    };

    let err = fixture
        .handler
        .handle_access_request(&request, &StaticVerifier::Accept)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UnknownClient));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_failed_verification_creates_no_session() {
    let fixture = TestFixture::new();
    let client = TestClient::new();
    let impostor = TestClient::new();

    let err = fixture
        .handler
        .handle_access_request(
            &client.access_request(vec![TokenRequest::reference("read-email")]),
            &impostor.verifier(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Authentication(_)));
    assert_eq!(fixture.store.session_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_registered_only_rejects_unseen_key() {
    let fixture = TestFixture::with_config(HandlerConfig {
        client_key_policy: KeyPolicy::RegisteredOnly,
        ..Default::default()
    });
    let client = TestClient::new();

    let err = fixture
        .handler
        .handle_access_request(
            &client.access_request(vec![TokenRequest::reference("read-email")]),
            &client.verifier(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UnknownClient));

    fixture.store.get_or_create_by_key(&client.key).await.unwrap();
    fixture
        .handler
        .handle_access_request(
            &client.access_request(vec![TokenRequest::reference("read-email")]),
            &client.verifier(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unknown_access_type_is_policy_error() {
    let fixture = TestFixture::new();
    let client = TestClient::new();

    let err = fixture
        .handler
        .handle_access_request(
            &client.access_request(vec![TokenRequest::reference("launch-missiles")]),
            &client.verifier(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Policy(_)));
    assert_eq!(err.kind(), ErrorKind::Collaborator);
}

#[tokio::test]
async fn test_reference_reuses_session_and_supersedes_continuation() {
    let fixture = TestFixture::new();
    let client = TestClient::new();
    let verifier = client.verifier();

    let first = fixture
        .handler
        .handle_access_request(
            &client.access_request(vec![TokenRequest::reference("read-email")]),
            &verifier,
        )
        .await
        .unwrap();

    let by_reference = AccessRequest {
        access_token: vec![TokenRequest::reference("read-ssn")],
        client: Some(ClientInstance::Reference(first.instance_id)),
        interact: InteractRequest::default(),
    };
    let second = fixture
        .handler
        .handle_access_request(&by_reference, &verifier)
        .await
        .unwrap();

    assert_eq!(second.instance_id, first.instance_id);
    assert_ne!(
        second.continuation.access_token,
        first.continuation.access_token
    );
    assert_eq!(fixture.store.session_count().await.unwrap(), 1);

    let stale = fixture
        .store
        .get_by_continue_token(&first.continuation.access_token)
        .await
        .unwrap();
    assert!(stale.is_none());

    let session = fixture
        .store
        .get_by_id(&first.instance_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        session.pending_requests,
        vec![TokenRequest::reference("read-ssn")]
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Continuation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_round_trip_issues_tokens_and_consumes_pending() {
    init_tracing();
    let fixture = TestFixture::new();
    let client = TestClient::new();

    let (response, grant) = fixture
        .grant(
            &client,
            vec![TokenRequest::reference("read-email")],
            "ref-1",
            email_consent(),
        )
        .await
        .unwrap();

    assert_eq!(grant.access_token.len(), 1);
    assert_eq!(grant.access_token[0].access, email_consent().tokens[0].access);
    assert!(grant.access_token[0].expires_at.is_none());

    let session = fixture
        .store
        .get_by_id(&response.instance_id)
        .await
        .unwrap()
        .unwrap();
    assert!(session.pending_requests.is_empty());
    assert!(session.continue_token.is_none());
    assert_eq!(session.access_tokens, grant.access_token);
    assert_eq!(session.subject_data["email"], "ann@example.com");
}

#[tokio::test]
async fn test_consent_cannot_widen_pending_requests() {
    let fixture = TestFixture::new();
    let client = TestClient::new();

    let (response, grant) = fixture
        .grant(
            &client,
            vec![TokenRequest::reference("read-email")],
            "ref-1",
            ConsentResult {
                subject_data: [("email".to_string(), "ann@example.com".to_string())].into(),
                tokens: vec![
                    TokenRequest::reference("read-email"),
                    TokenRequest::reference("read-ssn"),
                    TokenRequest::reference("read-email"),
                ],
            },
        )
        .await
        .unwrap();

    assert_eq!(grant.access_token.len(), 1);
    assert!(grant.access_token[0].answers(&TokenRequest::reference("read-email")));

    let session = fixture
        .store
        .get_by_id(&response.instance_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.access_tokens, grant.access_token);
    assert!(session.pending_requests.is_empty());
}

#[tokio::test]
async fn test_continuation_is_single_use() {
    let fixture = TestFixture::new();
    let client = TestClient::new();

    let (response, _) = fixture
        .grant(
            &client,
            vec![TokenRequest::reference("read-email")],
            "ref-1",
            email_consent(),
        )
        .await
        .unwrap();

    let err = fixture
        .handler
        .handle_continue_request(
            &continue_request("ref-1"),
            &response.continuation.access_token.to_hex(),
            &client.verifier(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UnknownContinuation));

    let session = fixture
        .store
        .get_by_id(&response.instance_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.access_tokens.len(), 1);
}

#[tokio::test]
async fn test_stale_continuation_issues_nothing() {
    let fixture = TestFixture::new();
    let client = TestClient::new();
    let verifier = client.verifier();
    let request = client.access_request(vec![TokenRequest::reference("read-email")]);

    let first = fixture
        .handler
        .handle_access_request(&request, &verifier)
        .await
        .unwrap();
    let _second = fixture
        .handler
        .handle_access_request(&request, &verifier)
        .await
        .unwrap();
    fixture.interaction.consent("ref-1", email_consent()).await;

    let err = fixture
        .handler
        .handle_continue_request(
            &continue_request("ref-1"),
            &first.continuation.access_token.to_hex(),
            &verifier,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UnknownContinuation));

    let session = fixture
        .store
        .get_by_id(&first.instance_id)
        .await
        .unwrap()
        .unwrap();
    assert!(session.access_tokens.is_empty());
    assert!(session.subject_data.is_empty());
}

#[tokio::test]
async fn test_unparseable_continue_token_is_unknown() {
    let fixture = TestFixture::new();
    let client = TestClient::new();

    for presented in ["", "not-hex", "abcd"] {
        let err = fixture
            .handler
            .handle_continue_request(&continue_request("ref-1"), presented, &client.verifier())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UnknownContinuation));
    }
}

#[tokio::test]
async fn test_continuation_verification_failure_keeps_continuation() {
    let fixture = TestFixture::new();
    let client = TestClient::new();

    let response = fixture
        .handler
        .handle_access_request(
            &client.access_request(vec![TokenRequest::reference("read-email")]),
            &client.verifier(),
        )
        .await
        .unwrap();
    fixture.interaction.consent("ref-1", email_consent()).await;
    let token = response.continuation.access_token.to_hex();

    let err = fixture
        .handler
        .handle_continue_request(&continue_request("ref-1"), &token, &StaticVerifier::Reject)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let grant = fixture
        .handler
        .handle_continue_request(&continue_request("ref-1"), &token, &client.verifier())
        .await
        .unwrap();
    assert_eq!(grant.access_token.len(), 1);
}

#[tokio::test]
async fn test_denied_interaction_issues_nothing() {
    let fixture = TestFixture::new();
    let client = TestClient::new();

    let response = fixture
        .handler
        .handle_access_request(
            &client.access_request(vec![TokenRequest::reference("read-email")]),
            &client.verifier(),
        )
        .await
        .unwrap();
    fixture.interaction.deny("ref-1").await;

    let err = fixture
        .handler
        .handle_continue_request(
            &continue_request("ref-1"),
            &response.continuation.access_token.to_hex(),
            &client.verifier(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Interaction(_)));

    let session = fixture
        .store
        .get_by_id(&response.instance_id)
        .await
        .unwrap()
        .unwrap();
    assert!(session.access_tokens.is_empty());
    assert!(session.has_continue_token(&response.continuation.access_token));
}

#[tokio::test]
async fn test_expired_continuation_is_unknown() {
    let fixture = TestFixture::with_config(HandlerConfig {
        continue_token_ttl: Some(Duration::ZERO),
        ..Default::default()
    });
    let client = TestClient::new();

    let err = fixture
        .grant(
            &client,
            vec![TokenRequest::reference("read-email")],
            "ref-1",
            email_consent(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UnknownContinuation));
}

#[tokio::test]
async fn test_access_token_ttl_sets_expiry() {
    let fixture = TestFixture::with_config(HandlerConfig {
        access_token_ttl: Some(Duration::from_secs(60)),
        ..Default::default()
    });
    let client = TestClient::new();

    let (_, grant) = fixture
        .grant(
            &client,
            vec![TokenRequest::reference("read-email")],
            "ref-1",
            email_consent(),
        )
        .await
        .unwrap();

    let token = &grant.access_token[0];
    assert_eq!(token.expires_at, Some(token.issued_at + 60_000));
}

#[tokio::test]
async fn test_round_trip_over_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteSessionStore::open(dir.path().join("sessions.db")).unwrap();
    let fixture = TestFixture::with_store(store, HandlerConfig::default());
    let client = TestClient::new();

    let (response, grant) = fixture
        .grant(
            &client,
            vec![TokenRequest::reference("read-email")],
            "ref-1",
            email_consent(),
        )
        .await
        .unwrap();

    let session = fixture
        .store
        .get_by_id(&response.instance_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.access_tokens, grant.access_token);
    assert!(session.pending_requests.is_empty());
    assert_eq!(session.subject_data["email"], "ann@example.com");
}
