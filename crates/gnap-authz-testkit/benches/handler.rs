//! Throughput of the protocol flows over the in-memory store.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tokio::runtime::Runtime;

use gnap_authz_core::{ConsentResult, TokenRequest};
use gnap_authz_testkit::{TestClient, TestFixture};

fn consent() -> ConsentResult {
    ConsentResult {
        subject_data: [("email".to_string(), "bench@example.com".to_string())].into(),
        tokens: vec![TokenRequest::reference("read-email")],
    }
}

fn bench_grant_round_trip(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap_or_else(|_| panic!("failed to create runtime"));
    let fixture = TestFixture::new();

    c.bench_function("grant_round_trip", |b| {
        b.iter(|| {
            // A fresh client each time so the request always needs consent.
            let client = TestClient::new();
            runtime.block_on(async {
                let result = fixture
                    .grant(
                        &client,
                        vec![TokenRequest::reference("read-email")],
                        "bench",
                        consent(),
                    )
                    .await;
                black_box(result.is_ok())
            })
        });
    });
}

fn bench_introspection(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap_or_else(|_| panic!("failed to create runtime"));
    let fixture = TestFixture::new();
    let client = TestClient::new();
    let rs = TestClient::new();

    let token = runtime
        .block_on(fixture.grant(
            &client,
            vec![TokenRequest::reference("read-email")],
            "bench",
            consent(),
        ))
        .map(|(_, grant)| grant.access_token[0].value.to_hex())
        .unwrap_or_else(|e| panic!("grant failed: {}", e));

    c.bench_function("introspect_active", |b| {
        let request = rs.introspect_request(&token);
        let verifier = rs.verifier();
        b.iter(|| {
            runtime.block_on(async {
                black_box(fixture.handler.handle_introspection(&request, &verifier).await.is_ok())
            })
        });
    });

    c.bench_function("introspect_unknown", |b| {
        let request = rs.introspect_request(&"00".repeat(32));
        let verifier = rs.verifier();
        b.iter(|| {
            runtime.block_on(async {
                black_box(fixture.handler.handle_introspection(&request, &verifier).await.is_ok())
            })
        });
    });
}

criterion_group!(benches, bench_grant_round_trip, bench_introspection);
criterion_main!(benches);
