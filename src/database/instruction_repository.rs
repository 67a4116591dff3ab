use crate::database::error::DatabaseError;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// One cached installation instruction block for a SIM.
///
/// `version` holds the provider's comma-separated OS version list
/// ("16.0,15.0"), or an empty string when the provider sent none. The
/// (iccid, os_type, install_type, version) tuple is unique so refreshes
/// overwrite in place instead of accumulating duplicates.
#[derive(Debug, Clone, FromRow)]
pub struct InstallInstructionRecord {
    pub id: Uuid,
    pub iccid: String,
    pub os_type: String,
    pub install_type: String,
    pub version: String,
    pub content: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Fields supplied when upserting an instruction record
#[derive(Debug, Clone)]
pub struct NewInstructionRecord {
    pub iccid: String,
    pub os_type: String,
    pub install_type: String,
    pub version: String,
    pub content: serde_json::Value,
}

/// Persistence seam for cached install instructions
#[async_trait]
pub trait InstructionStore: Send + Sync {
    async fn upsert(
        &self,
        record: NewInstructionRecord,
    ) -> Result<InstallInstructionRecord, DatabaseError>;

    async fn find_by_iccid(
        &self,
        iccid: &str,
    ) -> Result<Vec<InstallInstructionRecord>, DatabaseError>;
}

/// Repository for cached install instructions
pub struct InstructionRepository {
    pool: PgPool,
}

impl InstructionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstructionStore for InstructionRepository {
    async fn upsert(
        &self,
        record: NewInstructionRecord,
    ) -> Result<InstallInstructionRecord, DatabaseError> {
        sqlx::query_as::<_, InstallInstructionRecord>(
            "INSERT INTO install_instructions (iccid, os_type, install_type, version, content)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (iccid, os_type, install_type, version) DO UPDATE
             SET content = EXCLUDED.content, updated_at = NOW()
             RETURNING id, iccid, os_type, install_type, version, content,
                       created_at, updated_at",
        )
        .bind(&record.iccid)
        .bind(&record.os_type)
        .bind(&record.install_type)
        .bind(&record.version)
        .bind(&record.content)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_iccid(
        &self,
        iccid: &str,
    ) -> Result<Vec<InstallInstructionRecord>, DatabaseError> {
        sqlx::query_as::<_, InstallInstructionRecord>(
            "SELECT id, iccid, os_type, install_type, version, content, created_at, updated_at
             FROM install_instructions
             WHERE iccid = $1
             ORDER BY os_type ASC, install_type ASC, version ASC",
        )
        .bind(iccid)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
