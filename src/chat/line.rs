//! LINE messaging integration: webhook signature verification, event
//! parsing and the reply API client.

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;

use crate::config::LineConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Error)]
pub enum LineError {
    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Invalid webhook payload: {message}")]
    InvalidPayload { message: String },

    #[error("Reply failed: {message}")]
    ReplyFailed { message: String },
}

/// Webhook body: a list of events
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

/// One webhook event. Only text messages are acted on; everything else
/// is acknowledged and dropped.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(rename = "replyToken", default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl WebhookEvent {
    /// The text to answer, present only for text-message events that
    /// carry a reply token
    pub fn reply_text(&self) -> Option<(&str, &str)> {
        if self.event_type != "message" {
            return None;
        }
        let token = self.reply_token.as_deref()?;
        let message = self.message.as_ref()?;
        if message.message_type != "text" {
            return None;
        }
        Some((token, message.text.as_deref()?))
    }
}

/// Verify the `x-line-signature` header against the raw body.
///
/// Runs before any JSON parsing so a tampered body is rejected without
/// being interpreted. The signature is base64(HMAC-SHA256(channel
/// secret, body)); `verify_slice` compares in constant time.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    use base64::Engine;

    let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Compute the signature a valid sender would attach. Used by tests.
pub fn sign_body(channel_secret: &str, body: &[u8]) -> String {
    use base64::Engine;

    let mut mac =
        HmacSha256::new_from_slice(channel_secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(body);
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Reply API client
pub struct LineClient {
    config: LineConfig,
    http: Client,
}

impl LineClient {
    pub fn new(config: LineConfig) -> Result<Self, LineError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .map_err(|e| LineError::ReplyFailed {
                message: format!("failed to initialize HTTP client: {}", e),
            })?;

        Ok(Self { config, http })
    }

    pub fn channel_secret(&self) -> &str {
        &self.config.channel_secret
    }

    /// Send one text message against a reply token
    pub async fn reply_text(&self, reply_token: &str, text: &str) -> Result<(), LineError> {
        let payload = json!({
            "replyToken": reply_token,
            "messages": [{"type": "text", "text": text}],
        });

        let response = self
            .http
            .post(&self.config.reply_url)
            .bearer_auth(&self.config.channel_access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LineError::ReplyFailed {
                message: format!("reply request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LineError::ReplyFailed {
                message: format!("reply endpoint returned HTTP {}: {}", status, body),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-channel-secret";

    #[test]
    fn valid_signature_is_accepted() {
        let body = br#"{"events":[]}"#;
        let signature = sign_body(SECRET, body);
        assert!(verify_signature(SECRET, body, &signature));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let signature = sign_body(SECRET, br#"{"events":[]}"#);
        assert!(!verify_signature(
            SECRET,
            br#"{"events":[{"type":"message"}]}"#,
            &signature
        ));
    }

    #[test]
    fn malformed_base64_is_rejected() {
        assert!(!verify_signature(SECRET, b"body", "not base64!!!"));
    }

    #[test]
    fn only_text_message_events_yield_reply_text() {
        let payload: WebhookPayload = serde_json::from_str(
            r#"{"events":[
                {"type":"message","replyToken":"tok1","message":{"type":"text","text":"hi"}},
                {"type":"message","replyToken":"tok2","message":{"type":"sticker"}},
                {"type":"follow","replyToken":"tok3"}
            ]}"#,
        )
        .unwrap();

        let replies: Vec<_> = payload
            .events
            .iter()
            .filter_map(WebhookEvent::reply_text)
            .collect();
        assert_eq!(replies, vec![("tok1", "hi")]);
    }
}
