//! Liveness and readiness probes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::health::HealthState;
use crate::middleware::error::success_response;

use super::AppState;

/// GET /health — always 200 while the process is up
pub async fn liveness() -> Json<serde_json::Value> {
    success_response(serde_json::json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "status": "alive",
    }))
}

/// GET /health/ready — 503 when a critical dependency is down
pub async fn readiness(State(state): State<AppState>) -> Response {
    let status = state.health.check_health().await;

    if matches!(status.status, HealthState::Unhealthy) {
        error!("Readiness check failed");
        return (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response();
    }

    Json(status).into_response()
}
