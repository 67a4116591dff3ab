//! HTTP surface. Paths keep the legacy storefront contract names; every
//! handler resolves to a service call and renders either the
//! `{success: true, ...}` envelope or the standard error envelope.

pub mod checkout;
pub mod discounts;
pub mod health;
pub mod line;
pub mod profiles;
pub mod sims;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};

use crate::error::AppError;
use crate::health::HealthChecker;
use crate::middleware::logging::{request_logging_middleware, UuidRequestId};
use crate::services::{
    CheckoutService, DiscountService, InstructionService, LineWebhookService, ProfileService,
    TopupCatalogService, UsageService,
};

#[derive(Clone)]
pub struct AppState {
    pub checkout: Arc<CheckoutService>,
    pub topups: Arc<TopupCatalogService>,
    pub usage: Arc<UsageService>,
    pub instructions: Arc<InstructionService>,
    pub discounts: Arc<DiscountService>,
    pub profiles: Arc<ProfileService>,
    pub line_webhook: Arc<LineWebhookService>,
    pub health: HealthChecker,
}

/// Assemble the full application router with CORS, request-id and
/// request-logging layers.
pub fn build_router(state: AppState, cors_allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/process-payment", post(checkout::process_payment))
        .route("/airalo-topup-order", post(checkout::topup_order))
        .route(
            "/airalo-get-usage",
            get(sims::get_usage_query).post(sims::get_usage),
        )
        .route(
            "/airalo-get-topups",
            get(sims::get_topups_query).post(sims::get_topups),
        )
        .route(
            "/airalo-install-instructions",
            get(sims::install_instructions_query).post(sims::install_instructions),
        )
        .route("/bind-card", post(profiles::bind_card))
        .route("/remove-card", post(profiles::remove_card))
        .route(
            "/save-email",
            get(profiles::get_email).post(profiles::save_email),
        )
        .route("/verify-discount-code", post(discounts::verify_discount_code))
        .route("/line-webhook", post(line::webhook))
        .route("/health", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors_layer(cors_allowed_origins)),
        )
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Stamp the propagated request id onto an error before it renders
pub(crate) fn with_request_id(err: AppError, request_id: Option<String>) -> AppError {
    match request_id {
        Some(id) => err.with_request_id(id),
        None => err,
    }
}
