use crate::database::error::DatabaseError;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

/// Stored user profile: contact email and invoice carrier for invoicing,
/// plus the bound card credentials returned by the payment gateway.
#[derive(Debug, Clone, FromRow)]
pub struct UserProfile {
    pub user_id: String,
    pub email: Option<String>,
    pub invoice_carrier: Option<String>,
    pub card_key: Option<String>,
    pub card_token: Option<String>,
    pub card_last_four: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Persistence seam for user profiles
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<UserProfile>, DatabaseError>;

    /// Upsert email and invoice carrier. A `None` leaves the stored value
    /// untouched so the two can be saved independently.
    async fn upsert_contact(
        &self,
        user_id: &str,
        email: Option<&str>,
        invoice_carrier: Option<&str>,
    ) -> Result<UserProfile, DatabaseError>;

    /// Store the card credentials handed back by a successful bind
    async fn set_card(
        &self,
        user_id: &str,
        card_key: &str,
        card_token: &str,
        card_last_four: Option<&str>,
    ) -> Result<UserProfile, DatabaseError>;

    /// Null out the stored card. Returns false when the user had no
    /// profile row at all.
    async fn clear_card(&self, user_id: &str) -> Result<bool, DatabaseError>;
}

/// Repository for user profiles
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for ProfileRepository {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<UserProfile>, DatabaseError> {
        sqlx::query_as::<_, UserProfile>(
            "SELECT user_id, email, invoice_carrier, card_key, card_token, card_last_four,
                    created_at, updated_at
             FROM user_profiles
             WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn upsert_contact(
        &self,
        user_id: &str,
        email: Option<&str>,
        invoice_carrier: Option<&str>,
    ) -> Result<UserProfile, DatabaseError> {
        sqlx::query_as::<_, UserProfile>(
            "INSERT INTO user_profiles (user_id, email, invoice_carrier)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id) DO UPDATE
             SET email = COALESCE(EXCLUDED.email, user_profiles.email),
                 invoice_carrier = COALESCE(EXCLUDED.invoice_carrier, user_profiles.invoice_carrier),
                 updated_at = NOW()
             RETURNING user_id, email, invoice_carrier, card_key, card_token, card_last_four,
                       created_at, updated_at",
        )
        .bind(user_id)
        .bind(email)
        .bind(invoice_carrier)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn set_card(
        &self,
        user_id: &str,
        card_key: &str,
        card_token: &str,
        card_last_four: Option<&str>,
    ) -> Result<UserProfile, DatabaseError> {
        sqlx::query_as::<_, UserProfile>(
            "INSERT INTO user_profiles (user_id, card_key, card_token, card_last_four)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id) DO UPDATE
             SET card_key = EXCLUDED.card_key, card_token = EXCLUDED.card_token,
                 card_last_four = EXCLUDED.card_last_four, updated_at = NOW()
             RETURNING user_id, email, invoice_carrier, card_key, card_token, card_last_four,
                       created_at, updated_at",
        )
        .bind(user_id)
        .bind(card_key)
        .bind(card_token)
        .bind(card_last_four)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn clear_card(&self, user_id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE user_profiles
             SET card_key = NULL, card_token = NULL, card_last_four = NULL, updated_at = NOW()
             WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}
