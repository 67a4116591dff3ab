//! Single-use discount code verification.

use bigdecimal::BigDecimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::database::discount_code_repository::DiscountCodeStore;
use crate::error::{AppError, AppErrorKind, AppResult, DomainError};

#[derive(Debug, Clone, Serialize)]
pub struct RedeemedDiscount {
    pub code: String,
    pub rate: BigDecimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

pub struct DiscountService {
    store: Arc<dyn DiscountCodeStore>,
}

impl DiscountService {
    pub fn new(store: Arc<dyn DiscountCodeStore>) -> Self {
        Self { store }
    }

    /// Verify and redeem in one step. The flip to used is a conditional
    /// UPDATE, so concurrent calls on one code produce exactly one
    /// winner; the losers land in the already-used branch.
    pub async fn verify_and_redeem(
        &self,
        code: &str,
        user_id: &str,
    ) -> AppResult<RedeemedDiscount> {
        let existing = self.store.find_by_code(code).await?;
        let Some(existing) = existing else {
            return Err(AppError::new(AppErrorKind::Domain(
                DomainError::DiscountCodeNotFound {
                    code: code.to_string(),
                },
            )));
        };
        if existing.used {
            return Err(already_used(code));
        }

        // The find above raced someone; the UPDATE decides the winner.
        let Some(redeemed) = self.store.redeem(code, user_id).await? else {
            return Err(already_used(code));
        };

        info!(code, user_id, "Discount code redeemed");
        Ok(RedeemedDiscount {
            code: redeemed.code,
            rate: redeemed.rate,
            description: redeemed.description,
        })
    }
}

fn already_used(code: &str) -> AppError {
    AppError::new(AppErrorKind::Domain(DomainError::DiscountCodeUsed {
        code: code.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::discount_code_repository::DiscountCode;
    use crate::database::error::DatabaseError;
    use crate::error::ErrorCode;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct SingleCodeStore {
        code: Mutex<DiscountCode>,
    }

    impl SingleCodeStore {
        fn fresh(code: &str) -> Self {
            Self {
                code: Mutex::new(DiscountCode {
                    code: code.to_string(),
                    rate: "0.15".parse().unwrap(),
                    description: None,
                    used: false,
                    used_by: None,
                    used_at: None,
                    created_at: chrono::Utc::now(),
                }),
            }
        }
    }

    #[async_trait]
    impl DiscountCodeStore for SingleCodeStore {
        async fn find_by_code(&self, code: &str) -> Result<Option<DiscountCode>, DatabaseError> {
            let entry = self.code.lock().unwrap();
            Ok((entry.code == code).then(|| entry.clone()))
        }

        async fn redeem(
            &self,
            code: &str,
            user_id: &str,
        ) -> Result<Option<DiscountCode>, DatabaseError> {
            // mirrors the conditional UPDATE: only an unused row flips
            let mut entry = self.code.lock().unwrap();
            if entry.code != code || entry.used {
                return Ok(None);
            }
            entry.used = true;
            entry.used_by = Some(user_id.to_string());
            entry.used_at = Some(chrono::Utc::now());
            Ok(Some(entry.clone()))
        }
    }

    #[tokio::test]
    async fn concurrent_redemptions_have_exactly_one_winner() {
        let service = Arc::new(DiscountService::new(Arc::new(SingleCodeStore::fresh(
            "LAUNCH15",
        ))));

        let a = {
            let service = service.clone();
            tokio::spawn(async move { service.verify_and_redeem("LAUNCH15", "U1").await })
        };
        let b = {
            let service = service.clone();
            tokio::spawn(async move { service.verify_and_redeem("LAUNCH15", "U2").await })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        let wins = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);

        let loser = if a.is_err() { a } else { b };
        assert_eq!(
            loser.unwrap_err().error_code(),
            ErrorCode::DiscountCodeUsed
        );
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let service = DiscountService::new(Arc::new(SingleCodeStore::fresh("LAUNCH15")));

        let err = service.verify_and_redeem("NOPE", "U1").await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::DiscountCodeNotFound);
        assert_eq!(err.status_code(), 404);
    }
}
