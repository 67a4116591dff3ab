use crate::database::error::DatabaseError;
use async_trait::async_trait;
use sqlx::{types::BigDecimal, FromRow, PgPool};
use uuid::Uuid;

/// Resolved pricing for one topup package on one SIM
#[derive(Debug, Clone, FromRow)]
pub struct TopupPriceEntry {
    pub id: Uuid,
    pub iccid: String,
    pub package_id: String,
    pub title: Option<String>,
    pub data_amount: Option<String>,
    pub day: Option<i32>,
    pub is_unlimited: Option<bool>,
    pub net_price: BigDecimal,
    pub sell_price: BigDecimal,
    pub currency: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Fields supplied when upserting a topup price entry
#[derive(Debug, Clone)]
pub struct NewTopupPrice {
    pub iccid: String,
    pub package_id: String,
    pub title: Option<String>,
    pub data_amount: Option<String>,
    pub day: Option<i32>,
    pub is_unlimited: Option<bool>,
    pub net_price: BigDecimal,
    pub sell_price: BigDecimal,
    pub currency: String,
}

/// Persistence seam for topup pricing snapshots
#[async_trait]
pub trait TopupPriceStore: Send + Sync {
    /// One row per (iccid, package_id); repeat catalog fetches refresh
    /// the prices in place.
    async fn upsert(&self, entry: NewTopupPrice) -> Result<TopupPriceEntry, DatabaseError>;

    async fn find_by_iccid(&self, iccid: &str) -> Result<Vec<TopupPriceEntry>, DatabaseError>;
}

/// Repository for topup price snapshots
pub struct TopupPriceRepository {
    pool: PgPool,
}

impl TopupPriceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TopupPriceStore for TopupPriceRepository {
    async fn upsert(&self, entry: NewTopupPrice) -> Result<TopupPriceEntry, DatabaseError> {
        sqlx::query_as::<_, TopupPriceEntry>(
            "INSERT INTO topup_prices
             (iccid, package_id, title, data_amount, day, is_unlimited, net_price, sell_price, currency)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (iccid, package_id) DO UPDATE
             SET title = EXCLUDED.title, data_amount = EXCLUDED.data_amount,
                 day = EXCLUDED.day, is_unlimited = EXCLUDED.is_unlimited,
                 net_price = EXCLUDED.net_price,
                 sell_price = EXCLUDED.sell_price, currency = EXCLUDED.currency,
                 updated_at = NOW()
             RETURNING id, iccid, package_id, title, data_amount, day, is_unlimited, net_price,
                       sell_price, currency, created_at, updated_at",
        )
        .bind(&entry.iccid)
        .bind(&entry.package_id)
        .bind(&entry.title)
        .bind(&entry.data_amount)
        .bind(entry.day)
        .bind(entry.is_unlimited)
        .bind(&entry.net_price)
        .bind(&entry.sell_price)
        .bind(&entry.currency)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_iccid(&self, iccid: &str) -> Result<Vec<TopupPriceEntry>, DatabaseError> {
        sqlx::query_as::<_, TopupPriceEntry>(
            "SELECT id, iccid, package_id, title, data_amount, day, is_unlimited, net_price,
                    sell_price, currency, created_at, updated_at
             FROM topup_prices
             WHERE iccid = $1
             ORDER BY package_id ASC",
        )
        .bind(iccid)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
