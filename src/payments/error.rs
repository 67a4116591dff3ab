use serde_json::Value;
use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

/// Errors from the card gateway integration
#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    /// The gateway answered with a non-zero status. Charges are never
    /// retried, so this is always final; the raw response travels with
    /// the error because the contract surfaces it verbatim.
    #[error("Payment declined: {message}")]
    Declined {
        gateway_status: i64,
        message: String,
        raw: Value,
    },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    /// Response body did not match the documented shape
    #[error("Invalid gateway response: {message}")]
    InvalidResponse { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        // Charges are not idempotent at the gateway; nothing here is
        // safe to replay automatically.
        false
    }
}

impl From<PaymentError> for crate::error::AppError {
    fn from(err: PaymentError) -> Self {
        use crate::error::{
            AppError, AppErrorKind, DomainError, ExternalError, InfrastructureError,
            ValidationError,
        };

        let kind = match err {
            PaymentError::ValidationError { message, field } => match field {
                Some(field) => AppErrorKind::Validation(ValidationError::InvalidField {
                    field,
                    reason: message,
                }),
                None => AppErrorKind::Validation(ValidationError::InvalidPaymentMethod {
                    reason: message,
                }),
            },
            PaymentError::Declined {
                gateway_status,
                message,
                raw,
            } => AppErrorKind::Domain(DomainError::PaymentDeclined {
                gateway_status,
                message,
                response: raw,
            }),
            PaymentError::NetworkError { message } => {
                AppErrorKind::External(ExternalError::Provider {
                    provider: "TapPay".to_string(),
                    status: None,
                    message,
                    body: None,
                    is_retryable: false,
                })
            }
            PaymentError::InvalidResponse { message } => {
                AppErrorKind::External(ExternalError::Provider {
                    provider: "TapPay".to_string(),
                    status: None,
                    message,
                    body: None,
                    is_retryable: false,
                })
            }
            PaymentError::ConfigurationError { message } => {
                AppErrorKind::Infrastructure(InfrastructureError::Configuration { message })
            }
        };

        AppError::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn declined_maps_to_402_with_raw_payload() {
        let err = PaymentError::Declined {
            gateway_status: 10003,
            message: "Parameter amount is invalid".to_string(),
            raw: json!({"status": 10003, "msg": "Parameter amount is invalid"}),
        };
        assert!(!err.is_retryable());

        let app: crate::error::AppError = err.into();
        assert_eq!(app.status_code(), 402);
        assert_eq!(app.details().unwrap()["status"], 10003);
    }

    #[test]
    fn nothing_is_retryable() {
        assert!(!PaymentError::NetworkError {
            message: "timeout".to_string()
        }
        .is_retryable());
    }
}
