//! Purchase endpoints: card-charged checkout and the no-charge top-up
//! provisioning path.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use tracing::info;

use crate::error::AppError;
use crate::middleware::error::{get_request_id_from_headers, success_response};
use crate::services::{CheckoutRequest, TopupOrderRequest};

use super::{with_request_id, AppState};

/// POST /process-payment
pub async fn process_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    info!(
        package_id = payload.package_id.as_deref().unwrap_or("-"),
        "Checkout requested"
    );

    state
        .checkout
        .process_payment(payload)
        .await
        .map(success_response)
        .map_err(|err| with_request_id(err, request_id))
}

/// POST /airalo-topup-order
///
/// Provisions a top-up for a SIM sold earlier; payment was captured
/// upstream, so this runs the provisioning half of checkout only.
pub async fn topup_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<TopupOrderRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let request_id = get_request_id_from_headers(&headers);

    state
        .checkout
        .provision_topup(payload)
        .await
        .map(success_response)
        .map_err(|err| with_request_id(err, request_id))
}
