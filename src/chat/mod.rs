//! Support chat over LINE, answered by a hosted text model.

pub mod gemini;
pub mod line;

pub use gemini::{ChatError, ChatModel, GeminiClient};
pub use line::{LineClient, LineError, WebhookEvent, WebhookPayload};
