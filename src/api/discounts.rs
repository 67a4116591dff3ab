//! Discount-code redemption endpoint.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::error::{get_request_id_from_headers, success_response};

use super::{with_request_id, AppState};

#[derive(Debug, Deserialize)]
pub struct VerifyDiscountBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// POST /verify-discount-code
///
/// Verification redeems: a valid code is atomically marked used for this
/// caller, so a second attempt answers 409.
pub async fn verify_discount_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<VerifyDiscountBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let result = async {
        let code = match payload.code {
            Some(code) if !code.trim().is_empty() => code,
            _ => return Err(AppError::missing_field("code")),
        };
        let user_id = match payload.user_id {
            Some(user_id) if !user_id.trim().is_empty() => user_id,
            _ => return Err(AppError::missing_field("user_id")),
        };
        state.discounts.verify_and_redeem(&code, &user_id).await
    }
    .await;

    result
        .map(success_response)
        .map_err(|err| with_request_id(err, request_id))
}
