//! Usage lookups, cached briefly so the storefront can poll.

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::cache::{keys, RedisCache};
use crate::error::AppResult;
use crate::esim::client::EsimGateway;
use crate::esim::types::UsageSnapshot;

pub struct UsageService {
    provider: Arc<dyn EsimGateway>,
    cache: Option<RedisCache>,
    ttl: Duration,
}

impl UsageService {
    pub fn new(provider: Arc<dyn EsimGateway>, cache: Option<RedisCache>, ttl: Duration) -> Self {
        Self {
            provider,
            cache,
            ttl,
        }
    }

    /// Current usage for a SIM. Cache errors behave as misses and the
    /// live call proceeds.
    pub async fn get_usage(&self, iccid: &str) -> AppResult<UsageSnapshot> {
        let key = keys::sim::UsageKey::new(iccid).to_string();

        if let Some(cache) = &self.cache {
            match cache.get::<UsageSnapshot>(&key).await {
                Ok(Some(snapshot)) => return Ok(snapshot),
                Ok(None) => {}
                Err(err) => warn!(iccid, error = %err, "Usage cache read failed"),
            }
        }

        let snapshot = self.provider.get_usage(iccid).await?;

        if let Some(cache) = &self.cache {
            if let Err(err) = cache.set(&key, &snapshot, Some(self.ttl)).await {
                warn!(iccid, error = %err, "Usage cache write failed");
            }
        }

        Ok(snapshot)
    }
}
