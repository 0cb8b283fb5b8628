//! Concurrent use of one handler from many tasks.

use std::collections::HashSet;
use std::sync::Arc;

use gnap_authz::core::{ConsentResult, ContinueRequest, TokenRequest};
use gnap_authz::store::SessionStore;
use gnap_authz::AuthError;
use gnap_authz_testkit::{multi_party_clients, TestClient, TestFixture};

fn consent(tokens: usize) -> ConsentResult {
    ConsentResult {
        subject_data: [("email".to_string(), "ann@example.com".to_string())].into(),
        tokens: vec![TokenRequest::reference("read-email"); tokens],
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_contact_creates_one_session() {
    let fixture = Arc::new(TestFixture::new());
    let client = TestClient::new();

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let fixture = Arc::clone(&fixture);
            let client = client.clone();
            tokio::spawn(async move {
                fixture
                    .handler
                    .handle_access_request(
                        &client.access_request(vec![TokenRequest::reference("read-email")]),
                        &client.verifier(),
                    )
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap().instance_id);
    }

    assert_eq!(ids.len(), 1);
    assert_eq!(fixture.store.session_count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redemption_issues_once() {
    let fixture = Arc::new(TestFixture::new());
    let client = TestClient::new();

    let response = fixture
        .handler
        .handle_access_request(&client.access_request(consent(3).tokens), &client.verifier())
        .await
        .unwrap();
    fixture.interaction.consent("ref-1", consent(3)).await;
    let token = response.continuation.access_token.to_hex();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let fixture = Arc::clone(&fixture);
            let client = client.clone();
            let token = token.clone();
            tokio::spawn(async move {
                fixture
                    .handler
                    .handle_continue_request(
                        &ContinueRequest {
                            interact_ref: "ref-1".into(),
                        },
                        &token,
                        &client.verifier(),
                    )
                    .await
            })
        })
        .collect();

    let mut granted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(grant) => {
                assert_eq!(grant.access_token.len(), 3);
                granted += 1;
            }
            Err(AuthError::UnknownContinuation) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(granted, 1);

    let session = fixture
        .store
        .get_by_id(&response.instance_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.access_tokens.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_token_values_unique_across_clients() {
    let fixture = Arc::new(TestFixture::new());

    let handles: Vec<_> = multi_party_clients(16)
        .into_iter()
        .enumerate()
        .map(|(i, client)| {
            let fixture = Arc::clone(&fixture);
            tokio::spawn(async move {
                let (response, grant) = fixture
                    .grant(&client, consent(4).tokens, &format!("ref-{}", i), consent(4))
                    .await
                    .unwrap();
                (response, grant)
            })
        })
        .collect();

    let mut continue_tokens = HashSet::new();
    let mut access_tokens = HashSet::new();
    for handle in handles {
        let (response, grant) = handle.await.unwrap();
        assert!(continue_tokens.insert(response.continuation.access_token));
        for token in grant.access_token {
            assert!(access_tokens.insert(token.value));
        }
    }

    assert_eq!(access_tokens.len(), 16 * 4);
    assert_eq!(fixture.store.session_count().await.unwrap(), 16);
}
