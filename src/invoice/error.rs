use serde_json::Value;
use thiserror::Error;

pub type InvoiceResult<T> = Result<T, InvoiceError>;

/// Errors from the e-invoice integration. Invoice issuance is never
/// fatal to checkout; callers downgrade these to `invoice.success=false`.
#[derive(Debug, Clone, Error)]
pub enum InvoiceError {
    /// A required invoice field is empty. Named so operators can see
    /// which order field never made it into the request.
    #[error("Missing required invoice field: {field}")]
    MissingField { field: String },

    /// The invoice service answered with a non-zero status
    #[error("Invoice rejected: {message}")]
    Rejected {
        service_status: i64,
        message: String,
        raw: Value,
    },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Invalid invoice service response: {message}")]
    InvalidResponse { message: String },
}

impl From<InvoiceError> for crate::error::AppError {
    fn from(err: InvoiceError) -> Self {
        use crate::error::{AppError, AppErrorKind, ExternalError, ValidationError};

        let kind = match err {
            InvoiceError::MissingField { field } => {
                AppErrorKind::Validation(ValidationError::MissingField { field })
            }
            InvoiceError::Rejected { message, .. } => {
                AppErrorKind::External(ExternalError::Invoice { message })
            }
            InvoiceError::NetworkError { message } | InvoiceError::InvalidResponse { message } => {
                AppErrorKind::External(ExternalError::Invoice { message })
            }
        };

        AppError::new(kind)
    }
}
