use crate::database::error::DatabaseError;
use async_trait::async_trait;
use sqlx::{types::BigDecimal, FromRow, PgPool};

/// Single-use discount code entity. `rate` is the fractional discount
/// applied to the cart (0.1 = 10% off).
#[derive(Debug, Clone, FromRow)]
pub struct DiscountCode {
    pub code: String,
    pub rate: BigDecimal,
    pub description: Option<String>,
    pub used: bool,
    pub used_by: Option<String>,
    pub used_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Persistence seam for discount codes
#[async_trait]
pub trait DiscountCodeStore: Send + Sync {
    async fn find_by_code(&self, code: &str) -> Result<Option<DiscountCode>, DatabaseError>;

    /// Flip the code to used, but only if it is still unused. The
    /// conditional UPDATE makes concurrent redemptions race safely: the
    /// database picks exactly one winner and everyone else gets `None`.
    async fn redeem(
        &self,
        code: &str,
        user_id: &str,
    ) -> Result<Option<DiscountCode>, DatabaseError>;
}

/// Repository for discount codes
pub struct DiscountCodeRepository {
    pool: PgPool,
}

impl DiscountCodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DiscountCodeStore for DiscountCodeRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<DiscountCode>, DatabaseError> {
        sqlx::query_as::<_, DiscountCode>(
            "SELECT code, rate, description, used, used_by, used_at, created_at
             FROM discount_codes
             WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn redeem(
        &self,
        code: &str,
        user_id: &str,
    ) -> Result<Option<DiscountCode>, DatabaseError> {
        sqlx::query_as::<_, DiscountCode>(
            "UPDATE discount_codes
             SET used = true, used_by = $2, used_at = NOW()
             WHERE code = $1 AND used = false
             RETURNING code, rate, description, used, used_by, used_at, created_at",
        )
        .bind(code)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
