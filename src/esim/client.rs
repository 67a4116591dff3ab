//! HTTP client for the wholesale eSIM provider.
//!
//! All calls carry a bearer token from the in-process [`TokenCache`]. On
//! a 401 the cached token is invalidated, refetched and the request is
//! retried exactly once; a second 401 means the credentials themselves
//! are bad. No other status is ever retried here, because order
//! submission is not idempotent.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{info, warn};

use super::error::{EsimError, EsimResult};
use super::token::TokenCache;
use super::types::{
    Envelope, InstructionSet, ProviderOrder, SubmitOrderRequest, SubmitTopupRequest, TopupOrder,
    TopupPackage, UsageSnapshot,
};
use crate::config::AiraloConfig;

/// Verbatim body bytes carried in a content-type error
const MAX_BODY_SNIPPET_BYTES: usize = 500;

/// Operations the storefront needs from the wholesale provider
#[async_trait]
pub trait EsimGateway: Send + Sync {
    /// Place an order for new SIMs
    async fn submit_order(&self, request: SubmitOrderRequest) -> EsimResult<ProviderOrder>;

    /// Place a topup order against an existing SIM
    async fn submit_topup_order(&self, request: SubmitTopupRequest) -> EsimResult<TopupOrder>;

    /// Current usage for a SIM
    async fn get_usage(&self, iccid: &str) -> EsimResult<UsageSnapshot>;

    /// Topup packages purchasable for a SIM
    async fn get_topup_packages(&self, iccid: &str) -> EsimResult<Vec<TopupPackage>>;

    /// Localized installation instructions for a SIM
    async fn get_install_instructions(
        &self,
        iccid: &str,
        language: &str,
    ) -> EsimResult<InstructionSet>;
}

pub struct AiraloClient {
    config: AiraloConfig,
    http: Client,
    token_cache: TokenCache,
}

impl AiraloClient {
    pub fn new(config: AiraloConfig) -> EsimResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .map_err(|e| EsimError::NetworkError {
                message: format!("failed to initialize HTTP client: {}", e),
            })?;

        let token_cache = TokenCache::new(
            http.clone(),
            config.base_url.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
        );

        Ok(Self {
            config,
            http,
            token_cache,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Send an authorized request. On 401 the token is invalidated and
    /// the request rebuilt and resent once with a fresh token.
    async fn send_with_auth_retry<F>(&self, build: F) -> EsimResult<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        let token = self.token_cache.get_token().await?;
        let response = build()
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| EsimError::NetworkError {
                message: format!("provider request failed: {}", e),
            })?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!("Provider returned 401, refreshing token and retrying once");
        self.token_cache.invalidate().await;
        let token = self.token_cache.get_token().await?;
        let response = build()
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| EsimError::NetworkError {
                message: format!("provider request failed: {}", e),
            })?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(EsimError::AuthError {
                message: "provider rejected a freshly issued token".to_string(),
            });
        }

        Ok(response)
    }

    /// Unwrap the `data` envelope, mapping non-2xx statuses to errors
    /// that keep whatever body the provider sent.
    async fn parse_envelope<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> EsimResult<T> {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let body = serde_json::from_str::<serde_json::Value>(&text).ok();
            return Err(EsimError::HttpError {
                status: status.as_u16(),
                message: format!("HTTP {}: {}", status, body_snippet(&text)),
                body,
                retryable: status.is_server_error(),
            });
        }

        let envelope: Envelope<T> =
            serde_json::from_str(&text).map_err(|e| EsimError::InvalidResponse {
                message: format!("invalid provider JSON response: {}", e),
            })?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl EsimGateway for AiraloClient {
    async fn submit_order(&self, request: SubmitOrderRequest) -> EsimResult<ProviderOrder> {
        let url = self.endpoint("/v2/orders");
        let response = self
            .send_with_auth_retry(|| self.http.post(&url).form(&request))
            .await?;
        let order: ProviderOrder = self.parse_envelope(response).await?;
        info!(
            order_code = %order.code,
            package_id = %order.package_id,
            sims = order.sims.len(),
            "Provider order placed"
        );
        Ok(order)
    }

    async fn submit_topup_order(&self, request: SubmitTopupRequest) -> EsimResult<TopupOrder> {
        let url = self.endpoint("/v2/orders/topups");
        let response = self
            .send_with_auth_retry(|| self.http.post(&url).json(&request))
            .await?;

        // The topup endpoint has been seen answering through proxies with
        // HTML error pages. Surface the status and the start of the body
        // verbatim instead of a bare JSON parse failure.
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.starts_with("application/json") {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(EsimError::UnexpectedContentType {
                status,
                content_type,
                body: body_snippet(&text).to_string(),
            });
        }

        let topup: TopupOrder = self.parse_envelope(response).await?;
        info!(order_code = %topup.code, package_id = %topup.package_id, "Provider topup placed");
        Ok(topup)
    }

    async fn get_usage(&self, iccid: &str) -> EsimResult<UsageSnapshot> {
        let url = self.endpoint(&format!("/v2/sims/{}/usage", iccid));
        let response = self.send_with_auth_retry(|| self.http.get(&url)).await?;
        self.parse_envelope(response).await
    }

    async fn get_topup_packages(&self, iccid: &str) -> EsimResult<Vec<TopupPackage>> {
        let url = self.endpoint(&format!("/v2/sims/{}/topups", iccid));
        let response = self.send_with_auth_retry(|| self.http.get(&url)).await?;
        self.parse_envelope(response).await
    }

    async fn get_install_instructions(
        &self,
        iccid: &str,
        language: &str,
    ) -> EsimResult<InstructionSet> {
        let url = self.endpoint(&format!("/v2/sims/{}/instructions", iccid));
        let response = self
            .send_with_auth_retry(|| self.http.get(&url).header("Accept-Language", language))
            .await?;
        self.parse_envelope(response).await
    }
}

/// First `MAX_BODY_SNIPPET_BYTES` of a body, cut back to a char boundary
fn body_snippet(text: &str) -> &str {
    if text.len() <= MAX_BODY_SNIPPET_BYTES {
        return text;
    }
    let mut end = MAX_BODY_SNIPPET_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
