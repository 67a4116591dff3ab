//! LINE messaging webhook.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::warn;

use super::AppState;

const SIGNATURE_HEADER: &str = "x-line-signature";

/// POST /line-webhook
///
/// The signature covers the raw body, so verification happens before any
/// JSON parsing. Once the signature passes, the webhook always answers
/// 200 — reply failures are the service's problem, not LINE's.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let Some(signature) = signature else {
        warn!("Webhook rejected: missing signature header");
        return (StatusCode::UNAUTHORIZED, "Missing signature").into_response();
    };

    if !state.line_webhook.verify_signature(&body, signature) {
        warn!("Webhook rejected: signature mismatch");
        return (StatusCode::UNAUTHORIZED, "Invalid signature").into_response();
    }

    state.line_webhook.handle(&body).await;
    (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response()
}
