use thiserror::Error;

pub type EsimResult<T> = Result<T, EsimError>;

/// Errors from the wholesale eSIM provider integration
#[derive(Debug, Clone, Error)]
pub enum EsimError {
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// Credentials rejected even after a fresh token was obtained
    #[error("Authentication failed: {message}")]
    AuthError { message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    /// Response body did not match the documented shape
    #[error("Invalid provider response: {message}")]
    InvalidResponse { message: String },

    /// Provider answered with something other than JSON. The first part
    /// of the body is carried verbatim so operators can see the actual
    /// HTML error page or proxy message.
    #[error("Unexpected content type '{content_type}' (HTTP {status})")]
    UnexpectedContentType {
        status: u16,
        content_type: String,
        body: String,
    },

    #[error("Provider error: HTTP {status}: {message}")]
    HttpError {
        status: u16,
        message: String,
        body: Option<serde_json::Value>,
        retryable: bool,
    },
}

impl EsimError {
    pub fn is_retryable(&self) -> bool {
        match self {
            EsimError::ConfigurationError { .. } => false,
            EsimError::AuthError { .. } => false,
            EsimError::NetworkError { .. } => true,
            EsimError::InvalidResponse { .. } => false,
            EsimError::UnexpectedContentType { .. } => false,
            EsimError::HttpError { retryable, .. } => *retryable,
        }
    }
}

impl From<EsimError> for crate::error::AppError {
    fn from(err: EsimError) -> Self {
        use crate::error::{AppError, AppErrorKind, ExternalError, InfrastructureError};

        let kind = match err {
            EsimError::ConfigurationError { message } => {
                AppErrorKind::Infrastructure(InfrastructureError::Configuration { message })
            }
            EsimError::AuthError { message } => {
                AppErrorKind::External(ExternalError::ProviderAuth {
                    provider: "Airalo".to_string(),
                    message,
                })
            }
            EsimError::NetworkError { message } => {
                AppErrorKind::External(ExternalError::Provider {
                    provider: "Airalo".to_string(),
                    status: None,
                    message,
                    body: None,
                    is_retryable: true,
                })
            }
            EsimError::InvalidResponse { message } => {
                AppErrorKind::External(ExternalError::Provider {
                    provider: "Airalo".to_string(),
                    status: None,
                    message,
                    body: None,
                    is_retryable: false,
                })
            }
            EsimError::UnexpectedContentType {
                status,
                content_type,
                body,
            } => AppErrorKind::External(ExternalError::Provider {
                provider: "Airalo".to_string(),
                status: Some(status),
                message: format!("non-JSON response with content type '{}'", content_type),
                body: Some(serde_json::Value::String(body)),
                is_retryable: false,
            }),
            EsimError::HttpError {
                status,
                message,
                body,
                retryable,
            } => AppErrorKind::External(ExternalError::Provider {
                provider: "Airalo".to_string(),
                status: Some(status),
                message,
                body,
                is_retryable: retryable,
            }),
        };

        AppError::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_flags_are_set() {
        assert!(EsimError::NetworkError {
            message: "connect timeout".to_string()
        }
        .is_retryable());
        assert!(!EsimError::AuthError {
            message: "401 after refresh".to_string()
        }
        .is_retryable());
        assert!(EsimError::HttpError {
            status: 503,
            message: "upstream down".to_string(),
            body: None,
            retryable: true,
        }
        .is_retryable());
    }

    #[test]
    fn content_type_error_maps_to_provider_error_with_body() {
        let err = EsimError::UnexpectedContentType {
            status: 502,
            content_type: "text/html".to_string(),
            body: "<html>Bad Gateway</html>".to_string(),
        };
        let app: crate::error::AppError = err.into();
        assert_eq!(app.status_code(), 502);
        assert_eq!(
            app.details(),
            Some(serde_json::Value::String(
                "<html>Bad Gateway</html>".to_string()
            ))
        );
    }
}
