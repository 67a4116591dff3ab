//! HTTP client for the B2C e-invoice service.
//!
//! The service expects a flat JSON payload with the partner key inline,
//! amounts as whole currency units and a carrier descriptor picked by the
//! shared classifier. Business failure comes back as `status != 0` inside
//! a 200 response.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

use super::carrier::CarrierKind;
use super::error::{InvoiceError, InvoiceResult};
use crate::config::InvoiceConfig;

/// One invoice line item
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetailLine {
    pub description: String,
    pub quantity: i64,
    /// Unit price in whole currency units
    pub unit_price: i64,
    pub amount: i64,
}

/// A fully specified invoice issuance request. All fields are required
/// except the carrier, which falls back to the member carrier.
#[derive(Debug, Clone)]
pub struct InvoiceRequest {
    pub order_number: String,
    /// Order date, `YYYY/MM/DD`
    pub order_date: String,
    pub buyer_email: String,
    pub currency: String,
    /// Invoice category per the tax service ("B2C")
    pub invoice_type: String,
    pub sales_amount: i64,
    pub zero_tax_amount: i64,
    pub free_tax_amount: i64,
    pub tax_amount: i64,
    pub details: Vec<InvoiceDetailLine>,
    pub carrier: Option<String>,
}

impl InvoiceRequest {
    /// Check every required field the service rejects silently on,
    /// naming the first one missing.
    pub fn validate(&self) -> InvoiceResult<()> {
        let missing = |field: &str| InvoiceError::MissingField {
            field: field.to_string(),
        };

        if self.order_number.trim().is_empty() {
            return Err(missing("order_number"));
        }
        if self.order_date.trim().is_empty() {
            return Err(missing("order_date"));
        }
        if self.buyer_email.trim().is_empty() {
            return Err(missing("buyer_email"));
        }
        if self.currency.trim().is_empty() {
            return Err(missing("currency"));
        }
        if self.invoice_type.trim().is_empty() {
            return Err(missing("invoice_type"));
        }
        if self.details.is_empty() {
            return Err(missing("details"));
        }
        Ok(())
    }
}

/// A successfully issued invoice
#[derive(Debug, Clone)]
pub struct IssuedInvoice {
    pub invoice_number: String,
    pub random_code: Option<String>,
    pub raw: Value,
}

/// Issuance seam; checkout and the retry worker only see this trait.
#[async_trait]
pub trait InvoiceIssuer: Send + Sync {
    async fn issue(&self, request: &InvoiceRequest) -> InvoiceResult<IssuedInvoice>;
}

pub struct InvoiceClient {
    config: InvoiceConfig,
    http: Client,
}

impl InvoiceClient {
    pub fn new(config: InvoiceConfig) -> InvoiceResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .map_err(|e| InvoiceError::NetworkError {
                message: format!("failed to initialize HTTP client: {}", e),
            })?;

        Ok(Self { config, http })
    }

    fn build_payload(&self, request: &InvoiceRequest) -> InvoiceResult<Value> {
        if self.config.partner_key.trim().is_empty() {
            return Err(InvoiceError::MissingField {
                field: "partner_key".to_string(),
            });
        }
        if self.config.notify_url.trim().is_empty() {
            return Err(InvoiceError::MissingField {
                field: "notify_url".to_string(),
            });
        }
        request.validate()?;

        let carrier = CarrierKind::classify(request.carrier.as_deref());

        Ok(json!({
            "partner_key": self.config.partner_key,
            "seller_name": self.config.seller_name,
            "order_number": request.order_number,
            "order_date": request.order_date,
            "buyer_email": request.buyer_email,
            "currency": request.currency,
            "invoice_type": request.invoice_type,
            "sales_amount": request.sales_amount,
            "zero_tax_sales_amount": request.zero_tax_amount,
            "free_tax_sales_amount": request.free_tax_amount,
            "tax_amount": request.tax_amount,
            "details": request.details,
            "notify_url": self.config.notify_url,
            "carrier_type": carrier.type_code(),
            "carrier_number": carrier.number(),
            "notify_email": carrier.notify_by_email(),
        }))
    }
}

#[async_trait]
impl InvoiceIssuer for InvoiceClient {
    async fn issue(&self, request: &InvoiceRequest) -> InvoiceResult<IssuedInvoice> {
        let payload = self.build_payload(request)?;

        let response = self
            .http
            .post(format!("{}/einvoice/issue", self.config.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| InvoiceError::NetworkError {
                message: format!("invoice request failed: {}", e),
            })?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| InvoiceError::InvalidResponse {
                message: format!("invoice service returned invalid JSON (HTTP {}): {}", status, e),
            })?;

        let service_status = body
            .get("status")
            .and_then(Value::as_i64)
            .ok_or_else(|| InvoiceError::InvalidResponse {
                message: format!("invoice response has no status field (HTTP {})", status),
            })?;

        if service_status != 0 {
            let message = body
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("invoice service rejected the request")
                .to_string();
            return Err(InvoiceError::Rejected {
                service_status,
                message,
                raw: body,
            });
        }

        let invoice_number = body
            .get("invoice_number")
            .and_then(Value::as_str)
            .ok_or_else(|| InvoiceError::InvalidResponse {
                message: "invoice issued but invoice_number is missing".to_string(),
            })?
            .to_string();
        let random_code = body
            .get("random_number")
            .and_then(Value::as_str)
            .map(str::to_string);

        info!(
            order_number = %request.order_number,
            invoice_number = %invoice_number,
            "Invoice issued"
        );

        Ok(IssuedInvoice {
            invoice_number,
            random_code,
            raw: body,
        })
    }
}
