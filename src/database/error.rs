//! Database error classification.
//!
//! Raw `sqlx::Error` values are folded into a small set of kinds so that
//! callers can branch on what happened (missing row, constraint hit,
//! connection trouble) without string-matching driver messages.

use std::fmt;

/// What went wrong at the database layer
#[derive(Debug, Clone)]
pub enum DatabaseErrorKind {
    /// Row lookup that the caller required to succeed
    NotFound { entity: String, id: String },
    /// Unique constraint violation (duplicate order number, ICCID, ...)
    UniqueViolation { constraint: String },
    /// Foreign key violation
    ForeignKeyViolation { constraint: String },
    /// Pool exhaustion, network failure, server unavailable
    Connection { message: String },
    /// Anything else
    Unknown { message: String },
}

#[derive(Debug, Clone)]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        Self { kind }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::NotFound {
            entity: entity.into(),
            id: id.into(),
        })
    }

    /// Classify a raw sqlx error
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::new(DatabaseErrorKind::NotFound {
                entity: "row".to_string(),
                id: String::new(),
            }),
            sqlx::Error::Database(db_err) => {
                let constraint = db_err.constraint().unwrap_or_default().to_string();
                match db_err.code().as_deref() {
                    Some("23505") => Self::new(DatabaseErrorKind::UniqueViolation { constraint }),
                    Some("23503") => {
                        Self::new(DatabaseErrorKind::ForeignKeyViolation { constraint })
                    }
                    _ => Self::new(DatabaseErrorKind::Unknown {
                        message: db_err.to_string(),
                    }),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::new(DatabaseErrorKind::Connection {
                    message: err.to_string(),
                })
            }
            _ => Self::new(DatabaseErrorKind::Unknown {
                message: err.to_string(),
            }),
        }
    }

    /// Connection-level failures are worth retrying; constraint hits and
    /// missing rows are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::Connection { .. })
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DatabaseErrorKind::NotFound { entity, id } => {
                write!(f, "{} not found: {}", entity, id)
            }
            DatabaseErrorKind::UniqueViolation { constraint } => {
                write!(f, "Unique constraint violated: {}", constraint)
            }
            DatabaseErrorKind::ForeignKeyViolation { constraint } => {
                write!(f, "Foreign key constraint violated: {}", constraint)
            }
            DatabaseErrorKind::Connection { message } => {
                write!(f, "Database connection error: {}", message)
            }
            DatabaseErrorKind::Unknown { message } => {
                write!(f, "Database error: {}", message)
            }
        }
    }
}

impl std::error::Error for DatabaseError {}

impl From<DatabaseError> for crate::error::AppError {
    fn from(err: DatabaseError) -> Self {
        let is_retryable = err.is_retryable();
        crate::error::AppError::new(crate::error::AppErrorKind::Infrastructure(
            crate::error::InfrastructureError::Database {
                message: err.to_string(),
                is_retryable,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_errors_are_retryable() {
        let err = DatabaseError::new(DatabaseErrorKind::Connection {
            message: "pool timed out".to_string(),
        });
        assert!(err.is_retryable());
    }

    #[test]
    fn test_constraint_errors_are_not_retryable() {
        let err = DatabaseError::new(DatabaseErrorKind::UniqueViolation {
            constraint: "order_details_iccid_key".to_string(),
        });
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_not_found_display() {
        let err = DatabaseError::not_found("Order", "ES20250101000000ABCDEF");
        assert_eq!(err.to_string(), "Order not found: ES20250101000000ABCDEF");
    }
}
