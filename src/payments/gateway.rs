//! HTTP client for the card gateway (TapPay).
//!
//! Charges, card binding and card removal all go through the same
//! partner-key-authenticated JSON endpoints. The gateway reports business
//! failure inside a 200 response as `status != 0`, so every call checks
//! the envelope status before touching the payload. Nothing here retries:
//! a charge that timed out may still have been captured.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

use super::error::{PaymentError, PaymentResult};
use super::types::{
    BindCardRequest, BoundCard, CardSecret, ChargeOutcome, ChargeRequest, PaymentMethod,
};
use crate::config::TapPayConfig;

/// Operations the storefront needs from the card gateway
#[async_trait]
pub trait CardGateway: Send + Sync {
    /// Execute a charge with a one-time prime or a bound card
    async fn charge(
        &self,
        method: &PaymentMethod,
        request: &ChargeRequest,
    ) -> PaymentResult<ChargeOutcome>;

    /// Exchange a prime for reusable card credentials
    async fn bind_card(&self, request: &BindCardRequest) -> PaymentResult<BoundCard>;

    /// Invalidate bound card credentials at the gateway
    async fn remove_card(&self, card: &CardSecret) -> PaymentResult<Value>;
}

#[derive(Debug)]
pub struct TapPayClient {
    config: TapPayConfig,
    http: Client,
}

impl TapPayClient {
    pub fn new(config: TapPayConfig) -> PaymentResult<Self> {
        if config.partner_key.trim().is_empty() || config.merchant_id.trim().is_empty() {
            return Err(PaymentError::ConfigurationError {
                message: "card gateway credentials are not configured".to_string(),
            });
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .map_err(|e| PaymentError::NetworkError {
                message: format!("failed to initialize HTTP client: {}", e),
            })?;

        Ok(Self { config, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// POST a payload with the partner key header and unwrap the status
    /// envelope. A non-zero status becomes [`PaymentError::Declined`]
    /// carrying the gateway's message and the raw body.
    async fn post_checked(&self, path: &str, payload: Value) -> PaymentResult<Value> {
        let response = self
            .http
            .post(self.endpoint(path))
            .header("x-api-key", &self.config.partner_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError {
                message: format!("gateway request failed: {}", e),
            })?;

        let status = response.status();
        let body: Value =
            response
                .json()
                .await
                .map_err(|e| PaymentError::InvalidResponse {
                    message: format!("gateway returned invalid JSON (HTTP {}): {}", status, e),
                })?;

        let gateway_status =
            body.get("status")
                .and_then(Value::as_i64)
                .ok_or_else(|| PaymentError::InvalidResponse {
                    message: format!("gateway response has no status field (HTTP {})", status),
                })?;

        if gateway_status != 0 {
            let message = body
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("gateway rejected the request")
                .to_string();
            return Err(PaymentError::Declined {
                gateway_status,
                message,
                raw: body,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl CardGateway for TapPayClient {
    async fn charge(
        &self,
        method: &PaymentMethod,
        request: &ChargeRequest,
    ) -> PaymentResult<ChargeOutcome> {
        if request.amount <= 0 {
            return Err(PaymentError::ValidationError {
                message: "amount must be greater than 0".to_string(),
                field: Some("amount".to_string()),
            });
        }

        let mut payload = json!({
            "partner_key": self.config.partner_key,
            "merchant_id": self.config.merchant_id,
            "amount": request.amount,
            "currency": request.currency,
            "order_number": request.order_number,
            "details": request.details,
            "cardholder": request.cardholder,
        });

        let path = match method {
            PaymentMethod::Prime(prime) => {
                payload["prime"] = json!(prime);
                payload["remember"] = json!(request.remember);
                "/tpc/payment/pay-by-prime"
            }
            PaymentMethod::BoundCard {
                card_key,
                card_token,
            } => {
                payload["card_key"] = json!(card_key);
                payload["card_token"] = json!(card_token);
                "/tpc/payment/pay-by-card-token"
            }
        };

        let body = self.post_checked(path, payload).await?;

        let rec_trade_id = body
            .get("rec_trade_id")
            .and_then(Value::as_str)
            .ok_or_else(|| PaymentError::InvalidResponse {
                message: "charge succeeded but rec_trade_id is missing".to_string(),
            })?
            .to_string();
        let bank_transaction_id = body
            .get("bank_transaction_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let card_secret = body
            .get("card_secret")
            .and_then(|secret| serde_json::from_value::<CardSecret>(secret.clone()).ok());

        info!(
            rec_trade_id = %rec_trade_id,
            order_number = %request.order_number,
            amount = request.amount,
            "Charge captured"
        );

        Ok(ChargeOutcome {
            rec_trade_id,
            bank_transaction_id,
            card_secret,
            raw: body,
        })
    }

    async fn bind_card(&self, request: &BindCardRequest) -> PaymentResult<BoundCard> {
        if request.prime.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "prime is required".to_string(),
                field: Some("prime".to_string()),
            });
        }

        let payload = json!({
            "partner_key": self.config.partner_key,
            "merchant_id": self.config.merchant_id,
            "prime": request.prime,
            "currency": self.config.currency,
            "cardholder": request.cardholder,
        });

        let body = self.post_checked("/tpc/card/bind", payload).await?;

        let card_secret = body
            .get("card_secret")
            .and_then(|secret| serde_json::from_value::<CardSecret>(secret.clone()).ok())
            .ok_or_else(|| PaymentError::InvalidResponse {
                message: "bind succeeded but card_secret is missing".to_string(),
            })?;
        let card_last_four = body
            .get("card_info")
            .and_then(|info| info.get("last_four"))
            .and_then(Value::as_str)
            .map(str::to_string);

        info!("Card bound at gateway");

        Ok(BoundCard {
            card_secret,
            card_last_four,
            raw: body,
        })
    }

    async fn remove_card(&self, card: &CardSecret) -> PaymentResult<Value> {
        let payload = json!({
            "partner_key": self.config.partner_key,
            "card_key": card.card_key,
            "card_token": card.card_token,
        });

        let body = self.post_checked("/tpc/card/remove", payload).await?;
        info!("Card removed at gateway");
        Ok(body)
    }
}
