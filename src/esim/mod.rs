//! Wholesale eSIM provider integration: authenticated HTTP client,
//! token cache, sell-price resolution and instruction normalization.

pub mod client;
pub mod error;
pub mod instructions;
pub mod pricing;
pub mod token;
pub mod types;

pub use client::{AiraloClient, EsimGateway};
pub use error::{EsimError, EsimResult};
pub use pricing::PriceBook;
pub use token::TokenCache;
