//! Wire types for the wholesale eSIM provider API.
//!
//! Every endpoint wraps its payload in a `data` envelope. Structs keep a
//! flattened `extra` map so fields the provider adds later survive a
//! round trip into the database instead of being dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard `data` envelope around provider responses
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// Token endpoint payload
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenData {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Order submission, sent form-encoded
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOrderRequest {
    pub package_id: String,
    pub quantity: u32,
    #[serde(rename = "type")]
    pub order_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SubmitOrderRequest {
    pub fn sim(package_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            package_id: package_id.into(),
            quantity,
            order_type: "sim".to_string(),
            description: None,
        }
    }
}

/// Topup submission, sent as JSON
#[derive(Debug, Clone, Serialize)]
pub struct SubmitTopupRequest {
    pub package_id: String,
    pub iccid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A placed order, with the SIMs it provisioned
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderOrder {
    pub id: i64,
    pub code: String,
    pub package_id: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub sims: Vec<ProviderSim>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A placed topup order. Topups attach to an existing SIM, so no new SIM
/// records come back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopupOrder {
    pub id: i64,
    pub code: String,
    pub package_id: String,
    #[serde(default)]
    pub iccid: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// One provisioned SIM. `apn` is the raw per-OS block as the provider
/// sent it; the flat `apn_type`/`apn_value` pair is the shared fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSim {
    pub iccid: String,
    #[serde(default)]
    pub lpa: Option<String>,
    #[serde(default)]
    pub matching_id: Option<String>,
    #[serde(default)]
    pub qrcode: Option<String>,
    #[serde(default)]
    pub qrcode_url: Option<String>,
    #[serde(default)]
    pub apn_type: Option<String>,
    #[serde(default)]
    pub apn_value: Option<String>,
    #[serde(default)]
    pub is_roaming: Option<bool>,
    #[serde(default)]
    pub confirmation_code: Option<String>,
    #[serde(default)]
    pub apn: Option<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Remaining/total usage for a SIM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub remaining: i64,
    pub total: i64,
    #[serde(default)]
    pub expired_at: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub remaining_voice: Option<i64>,
    #[serde(default)]
    pub total_voice: Option<i64>,
    #[serde(default)]
    pub remaining_text: Option<i64>,
    #[serde(default)]
    pub total_text: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A topup package purchasable for a SIM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopupPackage {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Wholesale price in the provider's currency
    pub price: f64,
    #[serde(default)]
    pub day: Option<i32>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub is_unlimited: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Localized installation instructions, one block list per OS
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstructionSet {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub ios: Vec<OsInstructionBlock>,
    #[serde(default)]
    pub android: Vec<OsInstructionBlock>,
}

/// Instructions for one OS version range. `version` is the provider's
/// comma-separated OS version list ("16.0,15.0").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OsInstructionBlock {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation_via_qr_code: Option<QrInstallation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation_manual: Option<ManualInstallation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_setup: Option<NetworkSetup>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QrInstallation {
    #[serde(default)]
    pub steps: Value,
    #[serde(default)]
    pub qr_code_data: Option<String>,
    #[serde(default)]
    pub qr_code_url: Option<String>,
    #[serde(default)]
    pub direct_apple_installation_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManualInstallation {
    #[serde(default)]
    pub steps: Value,
    #[serde(default)]
    pub smdp_address_and_activation_code: Option<String>,
    #[serde(default)]
    pub confirmation_code: Option<String>,
}

/// APN configuration for data connectivity after install
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSetup {
    #[serde(default)]
    pub steps: Value,
    #[serde(default)]
    pub apn_type: Option<String>,
    #[serde(default)]
    pub apn_value: Option<String>,
    #[serde(default)]
    pub is_roaming: Option<bool>,
}
