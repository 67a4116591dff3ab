//! OAuth client-credentials token cache for the provider API.
//!
//! Tokens are cached in-process and reused until shortly before they
//! expire. Concurrent callers may race past an expired token and refresh
//! twice; both fetches return valid tokens and the last write wins, so
//! the race is left unsynchronized instead of serializing every request
//! behind a refresh lock.

use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info};

use super::error::{EsimError, EsimResult};
use super::types::{AccessTokenData, Envelope};

/// Renew this long before the provider-reported expiry
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct TokenCache {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    token: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token: RwLock::new(None),
        }
    }

    /// Return a valid access token, fetching a fresh one if the cached
    /// token is missing or inside the expiry margin.
    pub async fn get_token(&self) -> EsimResult<String> {
        if self.client_id.trim().is_empty() || self.client_secret.trim().is_empty() {
            return Err(EsimError::ConfigurationError {
                message: "provider client credentials are not configured".to_string(),
            });
        }

        {
            let guard = self.token.read().await;
            if let Some(cached) = guard.as_ref() {
                if cached.expires_at > Instant::now() {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let fresh = self.fetch_token().await?;
        let access_token = fresh.access_token.clone();

        let mut guard = self.token.write().await;
        *guard = Some(fresh);

        Ok(access_token)
    }

    /// Drop the cached token so the next caller fetches a fresh one.
    /// Called when the provider answers 401 despite a cached token.
    pub async fn invalidate(&self) {
        debug!("Invalidating cached provider token");
        let mut guard = self.token.write().await;
        *guard = None;
    }

    async fn fetch_token(&self) -> EsimResult<CachedToken> {
        let url = format!("{}/v2/token", self.base_url);
        let payload = serde_json::json!({
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "grant_type": "client_credentials",
        });

        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| EsimError::NetworkError {
                message: format!("token request failed: {}", e),
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(EsimError::AuthError {
                message: format!("token endpoint returned HTTP {}: {}", status, text),
            });
        }

        let envelope: Envelope<AccessTokenData> =
            serde_json::from_str(&text).map_err(|e| EsimError::InvalidResponse {
                message: format!("token endpoint returned invalid JSON: {}", e),
            })?;

        let ttl = effective_ttl(envelope.data.expires_in);
        info!(expires_in = envelope.data.expires_in, "Fetched provider access token");

        Ok(CachedToken {
            access_token: envelope.data.access_token,
            expires_at: Instant::now() + ttl,
        })
    }
}

/// Cache lifetime for a token: the reported expiry minus the renewal
/// margin, floored at zero so a short-lived token is simply not cached.
fn effective_ttl(expires_in: i64) -> Duration {
    Duration::from_secs((expires_in - EXPIRY_MARGIN_SECS).max(0) as u64)
}
