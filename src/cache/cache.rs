//! Typed cache handle shared across services.

use bb8::PooledConnection;
use bb8_redis::RedisConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::error::{CacheError, CacheResult};
use super::RedisPool;

/// Cloneable handle over the Redis pool. Values are stored as JSON under
/// the versioned keys built in [`super::keys`].
#[derive(Clone)]
pub struct RedisCache {
    pool: RedisPool,
    default_ttl: Duration,
}

impl RedisCache {
    pub fn new(pool: RedisPool) -> Self {
        Self {
            pool,
            default_ttl: Duration::from_secs(3600),
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Fetch and deserialize a cached value. `Ok(None)` is a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        let mut conn = self.get_connection().await?;
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(json) => {
                let value = serde_json::from_str(&json)?;
                debug!("Cache hit for {}", key);
                Ok(Some(value))
            }
            None => {
                debug!("Cache miss for {}", key);
                Ok(None)
            }
        }
    }

    /// Serialize and store a value. Falls back to the default TTL when the
    /// caller does not pass one; nothing is stored without an expiry.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let json = serde_json::to_string(value)?;
        let ttl = ttl.unwrap_or(self.default_ttl);
        let mut conn = self.get_connection().await?;
        let _: () = conn.set_ex(key, json, ttl.as_secs()).await?;
        Ok(())
    }

    /// Remove a key. Deleting a missing key is not an error.
    pub async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;
        let _: u64 = conn.del(key).await?;
        Ok(())
    }

    /// Raw connection for health checks
    pub async fn get_connection(
        &self,
    ) -> CacheResult<PooledConnection<'_, RedisConnectionManager>> {
        self.pool.get().await.map_err(CacheError::from)
    }
}
