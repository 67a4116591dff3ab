//! HTTP-level behavior of the wholesale provider client: token caching,
//! the single 401 retry, and the topup content-type guard.

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use esim_storefront_backend::config::AiraloConfig;
use esim_storefront_backend::esim::client::{AiraloClient, EsimGateway};
use esim_storefront_backend::esim::error::EsimError;
use esim_storefront_backend::esim::types::SubmitTopupRequest;

fn client_for(server: &MockServer) -> AiraloClient {
    AiraloClient::new(AiraloConfig {
        base_url: server.uri(),
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        request_timeout: 10,
    })
    .unwrap()
}

fn token_response(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "data": {
            "access_token": token,
            "expires_in": 3600,
            "token_type": "Bearer",
        }
    }))
}

fn usage_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "data": {
            "remaining": 512,
            "total": 1024,
            "status": "ACTIVE",
        }
    }))
}

#[tokio::test]
async fn token_is_fetched_once_and_reused() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/token"))
        .respond_with(token_response("tok-1"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/sims/8988/usage"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(usage_response())
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let first = client.get_usage("8988").await.unwrap();
    let second = client.get_usage("8988").await.unwrap();

    assert_eq!(first.remaining, 512);
    assert_eq!(second.total, 1024);
}

#[tokio::test]
async fn unauthorized_refreshes_token_and_retries_once() {
    let server = MockServer::start().await;

    // first token is stale by the time the call lands
    Mock::given(method("POST"))
        .and(path("/v2/token"))
        .respond_with(token_response("tok-stale"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/token"))
        .respond_with(token_response("tok-fresh"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/sims/8988/usage"))
        .and(header("authorization", "Bearer tok-stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/sims/8988/usage"))
        .and(header("authorization", "Bearer tok-fresh"))
        .respond_with(usage_response())
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let snapshot = client.get_usage("8988").await.unwrap();
    assert_eq!(snapshot.remaining, 512);
}

#[tokio::test]
async fn persistent_unauthorized_is_an_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/token"))
        .respond_with(token_response("tok"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/sims/8988/usage"))
        .respond_with(ResponseTemplate::new(401))
        // the client retries exactly once, never more
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.get_usage("8988").await.unwrap_err();
    assert!(matches!(err, EsimError::AuthError { .. }));
}

#[tokio::test]
async fn topup_html_response_surfaces_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/token"))
        .respond_with(token_response("tok"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/orders/topups"))
        .respond_with(ResponseTemplate::new(502).set_body_raw("<html>502 Bad Gateway</html>", "text/html"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .submit_topup_order(SubmitTopupRequest {
            package_id: "kr-topup-1gb".to_string(),
            iccid: "8988".to_string(),
            description: None,
        })
        .await
        .unwrap_err();

    match err {
        EsimError::UnexpectedContentType {
            status,
            content_type,
            body,
        } => {
            assert_eq!(status, 502);
            assert!(content_type.starts_with("text/html"));
            assert!(body.contains("502 Bad Gateway"));
        }
        other => panic!("expected UnexpectedContentType, got {other:?}"),
    }
}

#[tokio::test]
async fn provider_error_body_is_kept() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/token"))
        .respond_with(token_response("tok"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/sims/8988/usage"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"message": "sim not found"})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.get_usage("8988").await.unwrap_err();

    match err {
        EsimError::HttpError {
            status,
            body,
            retryable,
            ..
        } => {
            assert_eq!(status, 422);
            assert!(!retryable);
            assert_eq!(body.unwrap()["message"], "sim not found");
        }
        other => panic!("expected HttpError, got {other:?}"),
    }
}
