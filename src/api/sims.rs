//! Per-SIM lookups: usage, top-up catalog, install instructions.
//! Each endpoint accepts both a JSON POST body and a GET query string.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::error::{get_request_id_from_headers, success_response};

use super::{with_request_id, AppState};

const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Deserialize)]
pub struct SimRequest {
    #[serde(default)]
    pub iccid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InstructionsRequest {
    #[serde(default)]
    pub iccid: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

fn require_iccid(iccid: Option<String>) -> Result<String, AppError> {
    match iccid {
        Some(iccid) if !iccid.trim().is_empty() => Ok(iccid),
        _ => Err(AppError::missing_field("iccid")),
    }
}

async fn usage_inner(
    state: AppState,
    headers: HeaderMap,
    payload: SimRequest,
) -> Result<Json<serde_json::Value>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let iccid = require_iccid(payload.iccid).map_err(|e| with_request_id(e, request_id.clone()))?;

    state
        .usage
        .get_usage(&iccid)
        .await
        .map(success_response)
        .map_err(|err| with_request_id(err, request_id))
}

/// POST /airalo-get-usage
pub async fn get_usage(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SimRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    usage_inner(state, headers, payload).await
}

/// GET /airalo-get-usage?iccid=
pub async fn get_usage_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(payload): Query<SimRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    usage_inner(state, headers, payload).await
}

async fn topups_inner(
    state: AppState,
    headers: HeaderMap,
    payload: SimRequest,
) -> Result<Json<serde_json::Value>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let iccid = require_iccid(payload.iccid).map_err(|e| with_request_id(e, request_id.clone()))?;

    state
        .topups
        .get_topups(&iccid)
        .await
        .map(success_response)
        .map_err(|err| with_request_id(err, request_id))
}

/// POST /airalo-get-topups
pub async fn get_topups(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SimRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    topups_inner(state, headers, payload).await
}

/// GET /airalo-get-topups?iccid=
pub async fn get_topups_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(payload): Query<SimRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    topups_inner(state, headers, payload).await
}

async fn instructions_inner(
    state: AppState,
    headers: HeaderMap,
    payload: InstructionsRequest,
) -> Result<Json<serde_json::Value>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let iccid = require_iccid(payload.iccid).map_err(|e| with_request_id(e, request_id.clone()))?;
    let language = payload
        .language
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

    state
        .instructions
        .get_instructions(&iccid, &language)
        .await
        .map(|content| success_response(serde_json::json!({ "instructions": content })))
        .map_err(|err| with_request_id(err, request_id))
}

/// POST /airalo-install-instructions
pub async fn install_instructions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<InstructionsRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    instructions_inner(state, headers, payload).await
}

/// GET /airalo-install-instructions?iccid=&language=
pub async fn install_instructions_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(payload): Query<InstructionsRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    instructions_inner(state, headers, payload).await
}
