//! Gemini text-generation client for the support chat.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::config::GeminiConfig;

#[derive(Debug, Clone, Error)]
pub enum ChatError {
    #[error("Chat request failed: {message}")]
    RequestFailed { message: String },

    #[error("Chat model returned an unusable response: {message}")]
    InvalidResponse { message: String },
}

/// Completion seam for the webhook handler; tests swap in a fake.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ChatError>;
}

pub struct GeminiClient {
    config: GeminiConfig,
    http: Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, ChatError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .map_err(|e| ChatError::RequestFailed {
                message: format!("failed to initialize HTTP client: {}", e),
            })?;

        Ok(Self { config, http })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, ChatError> {
        let payload = json!({
            "contents": [{"parts": [{"text": prompt}]}],
        });

        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&payload)
            .send()
            .await
            .map_err(|e| ChatError::RequestFailed {
                message: format!("generation request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Chat model request rejected");
            return Err(ChatError::RequestFailed {
                message: format!("model endpoint returned HTTP {}: {}", status, body),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ChatError::InvalidResponse {
                message: format!("invalid JSON from model: {}", e),
            })?;

        let text = body
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.pointer("/content/parts/0/text"))
            .and_then(Value::as_str)
            .ok_or_else(|| ChatError::InvalidResponse {
                message: "response carries no candidate text".to_string(),
            })?;

        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::InvalidResponse {
                message: "candidate text is empty".to_string(),
            });
        }

        Ok(text.to_string())
    }
}
