//! Comprehensive error handling for the eSIM storefront backend
//!
//! This module provides a unified error system with proper HTTP status mapping,
//! user-friendly messages, and structured error codes for client handling.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "ORDER_NOT_FOUND")]
    OrderNotFound,
    #[serde(rename = "SIM_NOT_FOUND")]
    SimNotFound,
    #[serde(rename = "INSTRUCTIONS_NOT_FOUND")]
    InstructionsNotFound,
    #[serde(rename = "DISCOUNT_CODE_NOT_FOUND")]
    DiscountCodeNotFound,
    #[serde(rename = "DISCOUNT_CODE_USED")]
    DiscountCodeUsed,
    #[serde(rename = "CARD_NOT_BOUND")]
    CardNotBound,
    #[serde(rename = "PAYMENT_DECLINED")]
    PaymentDeclined,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CACHE_ERROR")]
    CacheError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502, 503, 504)
    #[serde(rename = "PROVIDER_AUTH_ERROR")]
    ProviderAuthError,
    #[serde(rename = "PROVIDER_ERROR")]
    ProviderError,
    #[serde(rename = "PROVISIONING_ERROR")]
    ProvisioningError,
    #[serde(rename = "INVOICE_ERROR")]
    InvoiceError,
    #[serde(rename = "RATE_LIMIT_ERROR")]
    RateLimitError,
    #[serde(rename = "EXTERNAL_SERVICE_TIMEOUT")]
    ExternalServiceTimeout,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Domain-specific business logic errors
#[derive(Debug, Clone)]
pub enum DomainError {
    /// Order with given id or number doesn't exist
    OrderNotFound { order_ref: String },
    /// No provisioned SIM matches the iccid
    SimNotFound { iccid: String },
    /// No installation content could be produced for the iccid
    InstructionsNotFound { iccid: String },
    /// Discount code doesn't exist
    DiscountCodeNotFound { code: String },
    /// Discount code was already redeemed
    DiscountCodeUsed { code: String },
    /// User has no card bound to their profile
    CardNotBound { user_id: String },
    /// The card gateway rejected the charge (non-zero status)
    PaymentDeclined {
        gateway_status: i64,
        message: String,
        response: Value,
    },
}

/// Infrastructure-level errors (database, cache, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    /// Database connection or query failure
    Database { message: String, is_retryable: bool },
    /// Redis cache unavailable
    Cache { message: String },
    /// Missing or invalid configuration
    Configuration { message: String },
}

/// External service errors (eSIM wholesaler, card gateway, invoice service)
#[derive(Debug, Clone)]
pub enum ExternalError {
    /// Provider authentication failed even after a token refresh
    ProviderAuth { provider: String, message: String },
    /// Provider call failed (bad status, network error, unparseable body)
    Provider {
        provider: String,
        status: Option<u16>,
        message: String,
        body: Option<Value>,
        is_retryable: bool,
    },
    /// Wholesale order failed after the charge was captured
    Provisioning {
        message: String,
        response: Option<Value>,
    },
    /// E-invoice issuing failed (non-fatal in checkout, fatal nowhere)
    Invoice { message: String },
    /// Rate limit exceeded
    RateLimit {
        service: String,
        retry_after: Option<u64>,
    },
    /// External service timeout
    Timeout { service: String, timeout_secs: u64 },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Required field missing
    MissingField { field: String },
    /// Invalid amount (format or value)
    InvalidAmount { amount: String, reason: String },
    /// Neither a prime nor a complete card_key/card_token pair was sent
    InvalidPaymentMethod { reason: String },
    /// Field value failed its format check
    InvalidField { field: String, reason: String },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation(ValidationError::MissingField {
            field: field.into(),
        }))
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::OrderNotFound { .. } => 404,
                DomainError::SimNotFound { .. } => 404,
                DomainError::InstructionsNotFound { .. } => 404,
                DomainError::DiscountCodeNotFound { .. } => 404,
                DomainError::DiscountCodeUsed { .. } => 409, // Conflict
                DomainError::CardNotBound { .. } => 404,
                DomainError::PaymentDeclined { .. } => 402, // Payment Required
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => 500,
                InfrastructureError::Cache { .. } => 500,
                InfrastructureError::Configuration { .. } => 500,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::ProviderAuth { .. } => 502, // Bad Gateway
                ExternalError::Provider { .. } => 502,
                ExternalError::Provisioning { .. } => 502,
                ExternalError::Invoice { .. } => 502,
                ExternalError::RateLimit { .. } => 429, // Too Many Requests
                ExternalError::Timeout { .. } => 504,   // Gateway Timeout
            },
            AppErrorKind::Validation(_) => 400,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::OrderNotFound { .. } => ErrorCode::OrderNotFound,
                DomainError::SimNotFound { .. } => ErrorCode::SimNotFound,
                DomainError::InstructionsNotFound { .. } => ErrorCode::InstructionsNotFound,
                DomainError::DiscountCodeNotFound { .. } => ErrorCode::DiscountCodeNotFound,
                DomainError::DiscountCodeUsed { .. } => ErrorCode::DiscountCodeUsed,
                DomainError::CardNotBound { .. } => ErrorCode::CardNotBound,
                DomainError::PaymentDeclined { .. } => ErrorCode::PaymentDeclined,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Cache { .. } => ErrorCode::CacheError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::ProviderAuth { .. } => ErrorCode::ProviderAuthError,
                ExternalError::Provider { .. } => ErrorCode::ProviderError,
                ExternalError::Provisioning { .. } => ErrorCode::ProvisioningError,
                ExternalError::Invoice { .. } => ErrorCode::InvoiceError,
                ExternalError::RateLimit { .. } => ErrorCode::RateLimitError,
                ExternalError::Timeout { .. } => ErrorCode::ExternalServiceTimeout,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::OrderNotFound { order_ref } => {
                    format!("Order '{}' not found", order_ref)
                }
                DomainError::SimNotFound { iccid } => {
                    format!("No eSIM found for iccid '{}'", iccid)
                }
                DomainError::InstructionsNotFound { iccid } => {
                    format!("No installation instructions available for iccid '{}'", iccid)
                }
                DomainError::DiscountCodeNotFound { code } => {
                    format!("Discount code '{}' not found", code)
                }
                DomainError::DiscountCodeUsed { code } => {
                    format!("Discount code '{}' has already been used", code)
                }
                DomainError::CardNotBound { user_id } => {
                    format!("No card is bound for user '{}'", user_id)
                }
                DomainError::PaymentDeclined { message, .. } => message.clone(),
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::ProviderAuth { provider, .. } => {
                    format!(
                        "Authentication with {} failed. Please try again later",
                        provider
                    )
                }
                ExternalError::Provider {
                    provider,
                    is_retryable,
                    ..
                } => {
                    if *is_retryable {
                        format!("{} is temporarily unavailable. Please try again", provider)
                    } else {
                        format!("{} request failed. Please contact support", provider)
                    }
                }
                ExternalError::Provisioning { message, .. } => {
                    format!(
                        "Your payment was received but the eSIM could not be issued: {}. Support will follow up",
                        message
                    )
                }
                ExternalError::Invoice { message } => {
                    format!("Invoice could not be issued: {}", message)
                }
                ExternalError::RateLimit {
                    service,
                    retry_after,
                } => {
                    if let Some(secs) = retry_after {
                        format!(
                            "Rate limit exceeded for {}. Please try again in {} seconds",
                            service, secs
                        )
                    } else {
                        format!("Rate limit exceeded for {}. Please try again later", service)
                    }
                }
                ExternalError::Timeout {
                    service,
                    timeout_secs,
                } => {
                    format!(
                        "{} request timed out after {} seconds. Please try again",
                        service, timeout_secs
                    )
                }
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::MissingField { field } => {
                    format!("Required field '{}' is missing", field)
                }
                ValidationError::InvalidAmount { amount, reason } => {
                    format!("Invalid amount '{}': {}", amount, reason)
                }
                ValidationError::InvalidPaymentMethod { reason } => {
                    format!("Invalid payment method: {}", reason)
                }
                ValidationError::InvalidField { field, reason } => {
                    format!("Invalid field '{}': {}", field, reason)
                }
            },
        }
    }

    /// Raw upstream payload to surface verbatim in the error response,
    /// where the contract requires it (payment decline, provisioning fail)
    pub fn details(&self) -> Option<Value> {
        match &self.kind {
            AppErrorKind::Domain(DomainError::PaymentDeclined { response, .. }) => {
                Some(response.clone())
            }
            AppErrorKind::External(ExternalError::Provisioning { response, .. }) => {
                response.clone()
            }
            AppErrorKind::External(ExternalError::Provider { body, .. }) => body.clone(),
            _ => None,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Cache { .. } => true,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::ProviderAuth { .. } => false,
                ExternalError::Provider { is_retryable, .. } => *is_retryable,
                ExternalError::Provisioning { .. } => false,
                ExternalError::Invoice { .. } => true,
                ExternalError::RateLimit { .. } => true,
                ExternalError::Timeout { .. } => true,
            },
            AppErrorKind::Validation(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

// Conversions from specific error types
// Note: From<DatabaseError> is implemented in database/error.rs to avoid circular dependency

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payment_declined_error() {
        let error = AppError::new(AppErrorKind::Domain(DomainError::PaymentDeclined {
            gateway_status: 10003,
            message: "Parameter amount is invalid".to_string(),
            response: json!({"status": 10003, "msg": "Parameter amount is invalid"}),
        }));

        assert_eq!(error.status_code(), 402);
        assert_eq!(error.error_code(), ErrorCode::PaymentDeclined);
        assert!(error.user_message().contains("amount"));
        assert!(error.details().is_some());
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_discount_code_used_error() {
        let error = AppError::new(AppErrorKind::Domain(DomainError::DiscountCodeUsed {
            code: "WELCOME100".to_string(),
        }));

        assert_eq!(error.status_code(), 409);
        assert_eq!(error.error_code(), ErrorCode::DiscountCodeUsed);
        assert!(error.user_message().contains("already been used"));
    }

    #[test]
    fn test_provider_auth_error() {
        let error = AppError::new(AppErrorKind::External(ExternalError::ProviderAuth {
            provider: "Airalo".to_string(),
            message: "401 after token refresh".to_string(),
        }));

        assert_eq!(error.status_code(), 502);
        assert_eq!(error.error_code(), ErrorCode::ProviderAuthError);
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_provisioning_error_keeps_payment_payload() {
        let error = AppError::new(AppErrorKind::External(ExternalError::Provisioning {
            message: "order endpoint returned 500".to_string(),
            response: Some(json!({"rec_trade_id": "D2024"})),
        }));

        assert_eq!(error.status_code(), 502);
        assert_eq!(error.details().unwrap()["rec_trade_id"], "D2024");
    }

    #[test]
    fn test_validation_error() {
        let error = AppError::missing_field("package_id");

        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::ValidationError);
        assert!(error.user_message().contains("package_id"));
        assert!(!error.is_retryable());
    }
}
