//! Top-up catalog: provider packages priced for the storefront.

use bigdecimal::BigDecimal;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

use crate::cache::{keys, RedisCache};
use crate::database::topup_price_repository::{NewTopupPrice, TopupPriceStore};
use crate::error::AppResult;
use crate::esim::client::EsimGateway;
use crate::esim::pricing::PriceBook;
use crate::esim::types::TopupPackage;

/// One purchasable package with its resolved sell price
#[derive(Debug, Clone, Serialize)]
pub struct PricedTopupPackage {
    pub package_id: String,
    pub title: Option<String>,
    pub data: Option<String>,
    pub day: Option<i32>,
    pub is_unlimited: Option<bool>,
    pub net_price: BigDecimal,
    pub sell_price: BigDecimal,
    pub currency: String,
}

/// Per-package outcome of the price snapshot upsert
#[derive(Debug, Clone, Serialize)]
pub struct UpsertOutcome {
    pub package_id: String,
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopupCatalog {
    pub iccid: String,
    pub packages: Vec<PricedTopupPackage>,
    #[serde(rename = "upsertResult")]
    pub upsert_result: Vec<UpsertOutcome>,
    #[serde(rename = "upsertError", skip_serializing_if = "Option::is_none")]
    pub upsert_error: Option<String>,
}

pub struct TopupCatalogService {
    provider: Arc<dyn EsimGateway>,
    store: Arc<dyn TopupPriceStore>,
    price_book: Arc<PriceBook>,
    cache: Option<RedisCache>,
    currency: String,
}

impl TopupCatalogService {
    pub fn new(
        provider: Arc<dyn EsimGateway>,
        store: Arc<dyn TopupPriceStore>,
        price_book: Arc<PriceBook>,
        cache: Option<RedisCache>,
        currency: String,
    ) -> Self {
        Self {
            provider,
            store,
            price_book,
            cache,
            currency,
        }
    }

    /// Fetch, price and snapshot the catalog for a SIM. Snapshot failures
    /// degrade to `upsertError`; the priced list still returns.
    pub async fn get_topups(&self, iccid: &str) -> AppResult<TopupCatalog> {
        let packages = self.fetch_packages(iccid).await?;

        let mut priced = Vec::with_capacity(packages.len());
        let mut upsert_result = Vec::with_capacity(packages.len());
        let mut upsert_error = None;

        for package in &packages {
            let net_price = net_price_of(package);
            let sell_price = self.price_book.resolve_sell_price(&package.id, &net_price);

            let outcome = self
                .store
                .upsert(NewTopupPrice {
                    iccid: iccid.to_string(),
                    package_id: package.id.clone(),
                    title: package.title.clone(),
                    data_amount: package.data.clone(),
                    day: package.day,
                    is_unlimited: package.is_unlimited,
                    net_price: net_price.clone(),
                    sell_price: sell_price.clone(),
                    currency: self.currency.clone(),
                })
                .await;
            if let Err(err) = &outcome {
                warn!(iccid, package_id = %package.id, error = %err, "Topup price upsert failed");
                if upsert_error.is_none() {
                    upsert_error = Some(err.to_string());
                }
            }
            upsert_result.push(UpsertOutcome {
                package_id: package.id.clone(),
                ok: outcome.is_ok(),
            });

            priced.push(PricedTopupPackage {
                package_id: package.id.clone(),
                title: package.title.clone(),
                data: package.data.clone(),
                day: package.day,
                is_unlimited: package.is_unlimited,
                net_price,
                sell_price,
                currency: self.currency.clone(),
            });
        }

        Ok(TopupCatalog {
            iccid: iccid.to_string(),
            packages: priced,
            upsert_result,
            upsert_error,
        })
    }

    /// Provider catalog, served from cache when fresh
    async fn fetch_packages(&self, iccid: &str) -> AppResult<Vec<TopupPackage>> {
        let key = keys::sim::TopupPackagesKey::new(iccid).to_string();

        if let Some(cache) = &self.cache {
            match cache.get::<Vec<TopupPackage>>(&key).await {
                Ok(Some(packages)) => return Ok(packages),
                Ok(None) => {}
                Err(err) => warn!(iccid, error = %err, "Topup package cache read failed"),
            }
        }

        let packages = self.provider.get_topup_packages(iccid).await?;

        if let Some(cache) = &self.cache {
            if let Err(err) = cache.set(&key, &packages, None).await {
                warn!(iccid, error = %err, "Topup package cache write failed");
            }
        }
        Ok(packages)
    }
}

fn net_price_of(package: &TopupPackage) -> BigDecimal {
    BigDecimal::from_str(&package.price.to_string()).unwrap_or_else(|_| BigDecimal::from(0))
}
