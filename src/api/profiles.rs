//! Profile endpoints: contact email/carrier and saved-card management.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::error::{get_request_id_from_headers, success_response};
use crate::payments::types::Cardholder;

use super::{with_request_id, AppState};

#[derive(Debug, Deserialize)]
pub struct BindCardRequestBody {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub prime: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserRequestBody {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveEmailBody {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveEmailQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

fn require_field(value: Option<String>, field: &str) -> Result<String, AppError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::missing_field(field)),
    }
}

/// POST /bind-card
pub async fn bind_card(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<BindCardRequestBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let result = async {
        let user_id = require_field(payload.user_id, "user_id")?;
        let prime = require_field(payload.prime, "prime")?;
        let cardholder = Cardholder {
            phone_number: payload.phone_number.unwrap_or_default(),
            name: payload.name.unwrap_or_default(),
            email: payload.email.unwrap_or_default(),
        };
        state.profiles.bind_card(&user_id, &prime, cardholder).await
    }
    .await;

    result
        .map(success_response)
        .map_err(|err| with_request_id(err, request_id))
}

/// POST /remove-card
pub async fn remove_card(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UserRequestBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let result = async {
        let user_id = require_field(payload.user_id, "user_id")?;
        state.profiles.remove_card(&user_id).await?;
        Ok(serde_json::json!({ "user_id": user_id }))
    }
    .await;

    result
        .map(success_response)
        .map_err(|err| with_request_id(err, request_id))
}

/// POST /save-email
pub async fn save_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SaveEmailBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let result = async {
        let user_id = require_field(payload.user_id, "user_id")?;
        let email = require_field(payload.email, "email")?;
        state
            .profiles
            .save_contact(&user_id, Some(&email), payload.carrier.as_deref())
            .await
    }
    .await;

    result
        .map(success_response)
        .map_err(|err| with_request_id(err, request_id))
}

/// GET /save-email — reads back the stored contact for a user
pub async fn get_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SaveEmailQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let result = async {
        let user_id = require_field(query.user_id, "user_id")?;
        state.profiles.get_contact(&user_id).await
    }
    .await;

    result
        .map(success_response)
        .map_err(|err| with_request_id(err, request_id))
}
