//! Sell price resolution.
//!
//! Curated prices live in an ordered list of per-country tables; the
//! first table containing the package id wins. Packages in no table get
//! the standard markup over wholesale, rounded half-up to one decimal.
//! Resolution is pure: same package id and net price always produce the
//! same sell price.

use bigdecimal::BigDecimal;
use bigdecimal::RoundingMode;
use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;

use crate::config::ConfigError;

/// Curated prices compiled into the binary; an external book overrides
/// them wholesale when configured
const DEFAULT_PRICE_BOOK: &str = include_str!("price_book.default.json");

const SELL_PRICE_SCALE: i64 = 1;

#[derive(Debug, Clone, Deserialize)]
pub struct PriceBook {
    pub currency: String,
    pub tables: Vec<CountryPriceTable>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountryPriceTable {
    pub country: String,
    pub prices: HashMap<String, BigDecimal>,
}

impl PriceBook {
    /// Load the embedded book, replaced by the JSON file at `path` when
    /// one is configured.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_PRICE_BOOK, FileFormat::Json));
        if let Some(path) = path {
            builder = builder.add_source(File::new(path, FileFormat::Json));
        }

        let settings = builder
            .build()
            .map_err(|e| ConfigError::InvalidValue(format!("price book: {}", e)))?;
        settings
            .try_deserialize()
            .map_err(|e| ConfigError::InvalidValue(format!("price book: {}", e)))
    }

    /// Curated price for a package, if any table lists it. Tables are
    /// scanned in order and the first hit wins.
    pub fn curated_price(&self, package_id: &str) -> Option<&BigDecimal> {
        self.tables
            .iter()
            .find_map(|table| table.prices.get(package_id))
    }

    /// Sell price for a package at the given wholesale price
    pub fn resolve_sell_price(&self, package_id: &str, net_price: &BigDecimal) -> BigDecimal {
        match self.curated_price(package_id) {
            Some(price) => price.clone(),
            None => fallback_sell_price(net_price),
        }
    }
}

/// Standard markup: net x 1.5, rounded half-up to one decimal
pub fn fallback_sell_price(net_price: &BigDecimal) -> BigDecimal {
    let markup = BigDecimal::new(15.into(), 1);
    (net_price * markup).with_scale_round(SELL_PRICE_SCALE, RoundingMode::HalfUp)
}
