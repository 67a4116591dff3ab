//! HTTP-level behavior of the card gateway client: the status envelope,
//! declines carrying the raw body, and the bound-card routing.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use esim_storefront_backend::config::TapPayConfig;
use esim_storefront_backend::payments::types::{
    BindCardRequest, CardSecret, Cardholder, ChargeRequest, PaymentMethod,
};
use esim_storefront_backend::payments::{CardGateway, PaymentError, TapPayClient};

fn client_for(server: &MockServer) -> TapPayClient {
    TapPayClient::new(TapPayConfig {
        base_url: server.uri(),
        partner_key: "partner-key".to_string(),
        merchant_id: "merchant-1".to_string(),
        currency: "TWD".to_string(),
        request_timeout: 10,
    })
    .unwrap()
}

fn charge_request() -> ChargeRequest {
    ChargeRequest {
        amount: 500,
        currency: "TWD".to_string(),
        order_number: "ES20250801000001".to_string(),
        details: "kr-7days-1gb".to_string(),
        cardholder: Cardholder {
            phone_number: "+886912345678".to_string(),
            name: "Lin Mei".to_string(),
            email: "mei@example.com".to_string(),
        },
        remember: false,
    }
}

#[tokio::test]
async fn successful_prime_charge_returns_trade_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tpc/payment/pay-by-prime"))
        .and(body_partial_json(json!({
            "prime": "prime-abc",
            "merchant_id": "merchant-1",
            "amount": 500,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "rec_trade_id": "REC789",
            "bank_transaction_id": "BANK001",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let outcome = client
        .charge(
            &PaymentMethod::Prime("prime-abc".to_string()),
            &charge_request(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.rec_trade_id, "REC789");
    assert_eq!(outcome.bank_transaction_id.as_deref(), Some("BANK001"));
    assert!(outcome.card_secret.is_none());
}

#[tokio::test]
async fn nonzero_status_inside_http_200_is_a_decline() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tpc/payment/pay-by-prime"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 10003,
            "msg": "Parameter amount is invalid",
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .charge(
            &PaymentMethod::Prime("prime-abc".to_string()),
            &charge_request(),
        )
        .await
        .unwrap_err();

    match err {
        PaymentError::Declined {
            gateway_status,
            message,
            raw,
        } => {
            assert_eq!(gateway_status, 10003);
            assert_eq!(message, "Parameter amount is invalid");
            assert_eq!(raw["status"], 10003);
        }
        other => panic!("expected Declined, got {other:?}"),
    }
    assert!(!PaymentError::Declined {
        gateway_status: 10003,
        message: String::new(),
        raw: json!({}),
    }
    .is_retryable());
}

#[tokio::test]
async fn bound_card_charges_go_to_the_token_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tpc/payment/pay-by-card-token"))
        .and(body_partial_json(json!({
            "card_key": "ck",
            "card_token": "ct",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "rec_trade_id": "REC790",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let outcome = client
        .charge(
            &PaymentMethod::BoundCard {
                card_key: "ck".to_string(),
                card_token: "ct".to_string(),
            },
            &charge_request(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.rec_trade_id, "REC790");
}

#[tokio::test]
async fn bind_card_returns_stored_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tpc/card/bind"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "card_secret": {"card_key": "ck-new", "card_token": "ct-new"},
            "card_info": {"last_four": "4242"},
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let bound = client
        .bind_card(&BindCardRequest {
            prime: "prime-bind".to_string(),
            cardholder: charge_request().cardholder,
        })
        .await
        .unwrap();

    assert_eq!(bound.card_secret.card_key, "ck-new");
    assert_eq!(bound.card_secret.card_token, "ct-new");
    assert_eq!(bound.card_last_four.as_deref(), Some("4242"));
}

#[tokio::test]
async fn remove_card_sends_the_stored_pair() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tpc/card/remove"))
        .and(body_partial_json(json!({
            "card_key": "ck",
            "card_token": "ct",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 0})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client
        .remove_card(&CardSecret {
            card_key: "ck".to_string(),
            card_token: "ct".to_string(),
        })
        .await
        .unwrap();
}
