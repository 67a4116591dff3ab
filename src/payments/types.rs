//! Types shared across the card gateway integration.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who the charge is for. The gateway requires contact fields on every
/// charge and bind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cardholder {
    pub phone_number: String,
    pub name: String,
    pub email: String,
}

/// How a charge is funded: a one-time prime from the frontend SDK, or a
/// card bound earlier. When a request carries both, the bound card wins.
#[derive(Debug, Clone)]
pub enum PaymentMethod {
    Prime(String),
    BoundCard { card_key: String, card_token: String },
}

/// A charge to execute
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    /// Amount in whole currency units
    pub amount: i64,
    pub currency: String,
    pub order_number: String,
    pub details: String,
    pub cardholder: Cardholder,
    /// Ask the gateway to return a reusable card_key/card_token pair
    pub remember: bool,
}

/// Reusable card credentials returned by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardSecret {
    pub card_key: String,
    pub card_token: String,
}

/// A captured charge. `raw` is the gateway response verbatim; it is
/// persisted with the order and surfaced on provisioning failures.
#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    pub rec_trade_id: String,
    pub bank_transaction_id: Option<String>,
    pub card_secret: Option<CardSecret>,
    pub raw: Value,
}

/// Card binding request
#[derive(Debug, Clone)]
pub struct BindCardRequest {
    pub prime: String,
    pub cardholder: Cardholder,
}

/// A successfully bound card
#[derive(Debug, Clone)]
pub struct BoundCard {
    pub card_secret: CardSecret,
    pub card_last_four: Option<String>,
    pub raw: Value,
}
