//! LINE webhook handling: verify, parse, answer.

use std::sync::Arc;
use tracing::{info, warn};

use crate::chat::gemini::ChatModel;
use crate::chat::line::{self, LineClient, WebhookPayload};

/// Sent when the chat model cannot produce an answer
const FALLBACK_REPLY: &str =
    "Sorry, I can't answer that right now. Please try again in a moment.";

pub struct LineWebhookService {
    line: Arc<LineClient>,
    chat: Arc<dyn ChatModel>,
}

impl LineWebhookService {
    pub fn new(line: Arc<LineClient>, chat: Arc<dyn ChatModel>) -> Self {
        Self { line, chat }
    }

    /// Signature check over the raw body, before any parsing
    pub fn verify_signature(&self, body: &[u8], signature: &str) -> bool {
        line::verify_signature(self.line.channel_secret(), body, signature)
    }

    /// Answer every text-message event. Runs only after the signature
    /// passed; nothing here fails the webhook response.
    pub async fn handle(&self, body: &[u8]) {
        let payload: WebhookPayload = match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "Webhook body is not a valid event payload");
                return;
            }
        };

        for event in &payload.events {
            let Some((reply_token, text)) = event.reply_text() else {
                continue;
            };

            let answer = match self.chat.complete(text).await {
                Ok(answer) => answer,
                Err(err) => {
                    warn!(error = %err, "Chat completion failed, sending fallback");
                    FALLBACK_REPLY.to_string()
                }
            };

            match self.line.reply_text(reply_token, &answer).await {
                Ok(()) => info!("Webhook reply sent"),
                Err(err) => warn!(error = %err, "Webhook reply failed"),
            }
        }
    }
}
