//! Checkout orchestration.
//!
//! Drives a purchase end to end: validate the payment input, charge the
//! card, provision at the wholesale provider, persist the order, then
//! issue the invoice best-effort. The step order is contractual — the
//! charge happens before provisioning, and a captured charge is never
//! silently lost: provisioning failures still persist an order row with
//! the raw payment response attached.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::database::order_repository::{
    InvoiceStatus, NewOrder, NewOrderDetail, Order, OrderStatus, OrderStore,
};
use crate::database::profile_repository::ProfileStore;
use crate::error::{AppError, AppErrorKind, AppResult, ExternalError, ValidationError};
use crate::esim::client::EsimGateway;
use crate::esim::pricing::PriceBook;
use crate::esim::types::{ProviderSim, SubmitOrderRequest, SubmitTopupRequest};
use crate::invoice::InvoiceIssuer;
use crate::payments::types::{Cardholder, ChargeOutcome, ChargeRequest, PaymentMethod};
use crate::payments::CardGateway;
use crate::services::invoicing::invoice_request_for_order;

/// Purchase request as the storefront sends it. Payment fields are
/// validated before any side effect; provisioning fields only after the
/// charge, matching the step order below.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub package_id: Option<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    /// Present for a top-up purchase against an existing SIM
    #[serde(default)]
    pub iccid: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub prime: Option<String>,
    #[serde(default)]
    pub card_key: Option<String>,
    #[serde(default)]
    pub card_token: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Invoice carrier string; classified downstream
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub remember: Option<bool>,
    #[serde(default)]
    pub details: Option<String>,
}

/// Top-up provisioning for a purchase already paid out of band. Same
/// pipeline as checkout minus the charge.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopupOrderRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub package_id: Option<String>,
    #[serde(default)]
    pub iccid: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
}

/// How the invoice saga ended for this purchase
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceOutcome {
    pub success: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InvoiceOutcome {
    fn skipped() -> Self {
        Self {
            success: false,
            status: InvoiceStatus::Skipped.as_str().to_string(),
            invoice_number: None,
            random_code: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub order_no: String,
    pub status: String,
    pub order_type: String,
    pub package_id: String,
    pub quantity: i32,
    pub sell_price: BigDecimal,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rec_trade_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_order_id: Option<String>,
    pub sims: Vec<ProviderSim>,
    pub invoice: InvoiceOutcome,
}

pub struct CheckoutService {
    cards: Arc<dyn CardGateway>,
    provider: Arc<dyn EsimGateway>,
    orders: Arc<dyn OrderStore>,
    profiles: Arc<dyn ProfileStore>,
    invoices: Arc<dyn InvoiceIssuer>,
    price_book: Arc<PriceBook>,
    currency: String,
    invoice_enabled: bool,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cards: Arc<dyn CardGateway>,
        provider: Arc<dyn EsimGateway>,
        orders: Arc<dyn OrderStore>,
        profiles: Arc<dyn ProfileStore>,
        invoices: Arc<dyn InvoiceIssuer>,
        price_book: Arc<PriceBook>,
        currency: String,
        invoice_enabled: bool,
    ) -> Self {
        Self {
            cards,
            provider,
            orders,
            profiles,
            invoices,
            price_book,
            currency,
            invoice_enabled,
        }
    }

    /// Full purchase: charge, provision, persist, invoice.
    pub async fn process_payment(&self, request: CheckoutRequest) -> AppResult<CheckoutResponse> {
        // Step 1: payment input, before any side effect
        let amount = match request.amount {
            None => return Err(AppError::missing_field("amount")),
            Some(amount) if amount <= 0 => {
                return Err(AppError::new(AppErrorKind::Validation(
                    ValidationError::InvalidAmount {
                        amount: amount.to_string(),
                        reason: "amount must be positive".to_string(),
                    },
                )))
            }
            Some(amount) => amount,
        };
        let method = resolve_payment_method(&request)?;

        let order_no = generate_order_no();
        let charge = ChargeRequest {
            amount,
            currency: self.currency.clone(),
            order_number: order_no.clone(),
            details: request
                .details
                .clone()
                .or_else(|| request.package_id.clone())
                .unwrap_or_else(|| "eSIM purchase".to_string()),
            cardholder: Cardholder {
                phone_number: request.phone_number.clone().unwrap_or_default(),
                name: request.name.clone().unwrap_or_default(),
                email: request.email.clone().unwrap_or_default(),
            },
            remember: request.remember.unwrap_or(false),
        };

        // Step 2: charge. Declines surface the gateway response verbatim
        // and nothing is retried.
        let outcome = self.cards.charge(&method, &charge).await?;
        info!(
            order_no = %order_no,
            rec_trade_id = %outcome.rec_trade_id,
            amount,
            "Charge captured"
        );

        // Step 3: provisioning input. A violation here happens after the
        // charge, so the trade id is logged for manual reconciliation.
        let user_id = require_after_charge(&request.user_id, "user_id", &outcome.rec_trade_id)?;
        let package_id =
            require_after_charge(&request.package_id, "package_id", &outcome.rec_trade_id)?;
        let quantity = request.quantity.unwrap_or(1).max(1);
        let iccid = request.iccid.clone().filter(|s| !s.trim().is_empty());

        // Step 4: provision
        let provisioned = match &iccid {
            Some(iccid) => {
                self.provider
                    .submit_topup_order(SubmitTopupRequest {
                        package_id: package_id.clone(),
                        iccid: iccid.clone(),
                        description: Some(order_no.clone()),
                    })
                    .await
                    .map(Provisioned::from_topup)
            }
            None => {
                self.provider
                    .submit_order(SubmitOrderRequest::sim(package_id.clone(), quantity))
                    .await
                    .map(Provisioned::from_order)
            }
        };
        let provisioned = match provisioned {
            Ok(provisioned) => provisioned,
            Err(err) => {
                return Err(self
                    .record_provisioning_failure(
                        &order_no, &user_id, &package_id, quantity, iccid, &outcome, err,
                    )
                    .await)
            }
        };

        // Step 6 before 5: the sell price is stored on the order row
        let net_price = provisioned.net_price();
        let sell_price = self.price_book.resolve_sell_price(&package_id, &net_price);

        // Step 5: persist order + one detail per SIM, atomically
        let new_order = NewOrder {
            order_no: order_no.clone(),
            user_id: user_id.clone(),
            order_type: provisioned.order_type().to_string(),
            package_id: package_id.clone(),
            quantity: quantity as i32,
            iccid,
            net_price,
            sell_price,
            currency: self.currency.clone(),
            status: OrderStatus::Provisioned,
            pay_trade_id: Some(outcome.rec_trade_id.clone()),
            payment_response: Some(outcome.raw.clone()),
            provider_order_id: Some(provisioned.order_code().to_string()),
            provider_response: Some(provisioned.raw()),
            invoice_status: if self.invoice_enabled {
                InvoiceStatus::Pending
            } else {
                InvoiceStatus::Skipped
            },
        };
        let details = provisioned.sims().iter().map(new_detail).collect();
        let (order, _) = self
            .orders
            .create_order_with_details(new_order, details)
            .await
            .map_err(|err| {
                error!(
                    order_no = %order_no,
                    provider_order_id = %provisioned.order_code(),
                    rec_trade_id = %outcome.rec_trade_id,
                    error = %err,
                    "Order persistence failed after provisioning"
                );
                AppError::from(err)
            })?;

        self.remember_card(&user_id, &request, &outcome).await;

        // Step 7: invoice, best-effort
        let invoice = self
            .issue_invoice(&order, request.email.as_deref(), request.carrier.clone())
            .await;

        Ok(CheckoutResponse {
            order_no: order.order_no,
            status: order.status,
            order_type: order.order_type,
            package_id: order.package_id,
            quantity: order.quantity,
            sell_price: order.sell_price,
            currency: order.currency,
            rec_trade_id: order.pay_trade_id,
            provider_order_id: order.provider_order_id,
            sims: provisioned.into_sims(),
            invoice,
        })
    }

    /// Provision a top-up without charging. The iccid must belong to a
    /// SIM this storefront sold.
    pub async fn provision_topup(&self, request: TopupOrderRequest) -> AppResult<CheckoutResponse> {
        let user_id = require_field(&request.user_id, "user_id")?;
        let package_id = require_field(&request.package_id, "package_id")?;
        let iccid = require_field(&request.iccid, "iccid")?;

        let owned = self.orders.find_detail_by_iccid(&iccid).await?;
        if owned.is_none() {
            return Err(AppError::new(AppErrorKind::Validation(
                ValidationError::InvalidField {
                    field: "iccid".to_string(),
                    reason: "no provisioned eSIM matches this iccid".to_string(),
                },
            )));
        }

        let order_no = generate_order_no();
        let topup = self
            .provider
            .submit_topup_order(SubmitTopupRequest {
                package_id: package_id.clone(),
                iccid: iccid.clone(),
                description: Some(order_no.clone()),
            })
            .await?;
        let provisioned = Provisioned::from_topup(topup);

        let net_price = provisioned.net_price();
        let sell_price = self.price_book.resolve_sell_price(&package_id, &net_price);

        let order = self
            .orders
            .create_order(NewOrder {
                order_no: order_no.clone(),
                user_id: user_id.clone(),
                order_type: "topup".to_string(),
                package_id: package_id.clone(),
                quantity: 1,
                iccid: Some(iccid),
                net_price,
                sell_price,
                currency: self.currency.clone(),
                status: OrderStatus::Provisioned,
                pay_trade_id: None,
                payment_response: None,
                provider_order_id: Some(provisioned.order_code().to_string()),
                provider_response: Some(provisioned.raw()),
                invoice_status: if self.invoice_enabled {
                    InvoiceStatus::Pending
                } else {
                    InvoiceStatus::Skipped
                },
            })
            .await?;

        let invoice = self
            .issue_invoice(&order, request.email.as_deref(), request.carrier.clone())
            .await;

        Ok(CheckoutResponse {
            order_no: order.order_no,
            status: order.status,
            order_type: order.order_type,
            package_id: order.package_id,
            quantity: order.quantity,
            sell_price: order.sell_price,
            currency: order.currency,
            rec_trade_id: None,
            provider_order_id: order.provider_order_id,
            sims: Vec::new(),
            invoice,
        })
    }

    /// Persist the failed purchase so the captured charge stays visible,
    /// then build the provisioning error for the caller.
    #[allow(clippy::too_many_arguments)]
    async fn record_provisioning_failure(
        &self,
        order_no: &str,
        user_id: &str,
        package_id: &str,
        quantity: u32,
        iccid: Option<String>,
        outcome: &ChargeOutcome,
        err: crate::esim::error::EsimError,
    ) -> AppError {
        error!(
            order_no = %order_no,
            rec_trade_id = %outcome.rec_trade_id,
            error = %err,
            "Provisioning failed after charge captured"
        );

        let order_type = if iccid.is_some() { "topup" } else { "sim" };
        let persisted = self
            .orders
            .create_order(NewOrder {
                order_no: order_no.to_string(),
                user_id: user_id.to_string(),
                order_type: order_type.to_string(),
                package_id: package_id.to_string(),
                quantity: quantity as i32,
                iccid,
                net_price: BigDecimal::from(0),
                sell_price: BigDecimal::from(0),
                currency: self.currency.clone(),
                status: OrderStatus::PaymentCapturedProvisioningFailed,
                pay_trade_id: Some(outcome.rec_trade_id.clone()),
                payment_response: Some(outcome.raw.clone()),
                provider_order_id: None,
                provider_response: None,
                invoice_status: InvoiceStatus::Skipped,
            })
            .await;
        if let Err(db_err) = persisted {
            error!(
                order_no = %order_no,
                rec_trade_id = %outcome.rec_trade_id,
                error = %db_err,
                "Failed to persist provisioning-failure order row"
            );
        }

        AppError::new(AppErrorKind::External(ExternalError::Provisioning {
            message: err.to_string(),
            response: Some(outcome.raw.clone()),
        }))
    }

    /// Store the reusable card credentials when the charge asked for them
    async fn remember_card(&self, user_id: &str, request: &CheckoutRequest, outcome: &ChargeOutcome) {
        if !request.remember.unwrap_or(false) {
            return;
        }
        let Some(secret) = &outcome.card_secret else {
            return;
        };
        if let Err(err) = self
            .profiles
            .set_card(user_id, &secret.card_key, &secret.card_token, None)
            .await
        {
            warn!(user_id = %user_id, error = %err, "Failed to store card credentials");
        }
    }

    async fn issue_invoice(
        &self,
        order: &Order,
        email: Option<&str>,
        carrier: Option<String>,
    ) -> InvoiceOutcome {
        if !self.invoice_enabled {
            return InvoiceOutcome::skipped();
        }

        // Fall back to the stored profile for buyer email and carrier
        let profile = if email.is_none() || carrier.is_none() {
            self.profiles
                .find_by_user_id(&order.user_id)
                .await
                .unwrap_or_else(|err| {
                    warn!(user_id = %order.user_id, error = %err, "Profile lookup failed");
                    None
                })
        } else {
            None
        };
        let email = email
            .map(str::to_string)
            .or_else(|| profile.as_ref().and_then(|p| p.email.clone()))
            .unwrap_or_default();
        let carrier = carrier.or_else(|| profile.as_ref().and_then(|p| p.invoice_carrier.clone()));

        let request = invoice_request_for_order(order, &email, carrier);
        match self.invoices.issue(&request).await {
            Ok(issued) => {
                if let Err(err) = self
                    .orders
                    .update_invoice_result(
                        order.id,
                        InvoiceStatus::Issued,
                        Some(&issued.invoice_number),
                        issued.random_code.as_deref(),
                    )
                    .await
                {
                    warn!(order_no = %order.order_no, error = %err, "Invoice issued but order update failed");
                }
                InvoiceOutcome {
                    success: true,
                    status: InvoiceStatus::Issued.as_str().to_string(),
                    invoice_number: Some(issued.invoice_number),
                    random_code: issued.random_code,
                    error: None,
                }
            }
            Err(err) => {
                warn!(order_no = %order.order_no, error = %err, "Invoice issuance failed");
                if let Err(db_err) = self
                    .orders
                    .update_invoice_result(order.id, InvoiceStatus::Failed, None, None)
                    .await
                {
                    warn!(order_no = %order.order_no, error = %db_err, "Failed to record invoice failure");
                }
                InvoiceOutcome {
                    success: false,
                    status: InvoiceStatus::Failed.as_str().to_string(),
                    invoice_number: None,
                    random_code: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}

/// What the provider handed back, normalized across SIM and top-up orders
enum Provisioned {
    Order(crate::esim::types::ProviderOrder),
    Topup(crate::esim::types::TopupOrder),
}

impl Provisioned {
    fn from_order(order: crate::esim::types::ProviderOrder) -> Self {
        Provisioned::Order(order)
    }

    fn from_topup(topup: crate::esim::types::TopupOrder) -> Self {
        Provisioned::Topup(topup)
    }

    fn order_type(&self) -> &'static str {
        match self {
            Provisioned::Order(_) => "sim",
            Provisioned::Topup(_) => "topup",
        }
    }

    fn order_code(&self) -> &str {
        match self {
            Provisioned::Order(order) => &order.code,
            Provisioned::Topup(topup) => &topup.code,
        }
    }

    /// Wholesale price out of the provider payload, zero when absent
    fn net_price(&self) -> BigDecimal {
        let extra = match self {
            Provisioned::Order(order) => &order.extra,
            Provisioned::Topup(topup) => &topup.extra,
        };
        extra
            .get("price")
            .and_then(value_to_decimal)
            .unwrap_or_else(|| BigDecimal::from(0))
    }

    fn sims(&self) -> &[ProviderSim] {
        match self {
            Provisioned::Order(order) => &order.sims,
            Provisioned::Topup(_) => &[],
        }
    }

    fn into_sims(self) -> Vec<ProviderSim> {
        match self {
            Provisioned::Order(order) => order.sims,
            Provisioned::Topup(_) => Vec::new(),
        }
    }

    fn raw(&self) -> Value {
        match self {
            Provisioned::Order(order) => serde_json::to_value(order).unwrap_or(Value::Null),
            Provisioned::Topup(topup) => serde_json::to_value(topup).unwrap_or(Value::Null),
        }
    }
}

fn new_detail(sim: &ProviderSim) -> NewOrderDetail {
    NewOrderDetail {
        iccid: sim.iccid.clone(),
        lpa: sim.lpa.clone(),
        matching_id: sim.matching_id.clone(),
        qrcode: sim.qrcode.clone(),
        qrcode_url: sim.qrcode_url.clone(),
        apn_type: sim.apn_type.clone(),
        apn_value: sim.apn_value.clone(),
        is_roaming: sim.is_roaming,
        confirmation_code: sim.confirmation_code.clone(),
        apn: sim.apn.clone(),
    }
}

/// Bound card wins when the request carries both it and a prime
fn resolve_payment_method(request: &CheckoutRequest) -> AppResult<PaymentMethod> {
    let card_key = request.card_key.as_deref().filter(|s| !s.trim().is_empty());
    let card_token = request
        .card_token
        .as_deref()
        .filter(|s| !s.trim().is_empty());
    if let (Some(card_key), Some(card_token)) = (card_key, card_token) {
        return Ok(PaymentMethod::BoundCard {
            card_key: card_key.to_string(),
            card_token: card_token.to_string(),
        });
    }

    if let Some(prime) = request.prime.as_deref().filter(|s| !s.trim().is_empty()) {
        return Ok(PaymentMethod::Prime(prime.to_string()));
    }

    Err(AppError::new(AppErrorKind::Validation(
        ValidationError::InvalidPaymentMethod {
            reason: "either prime or both card_key and card_token are required".to_string(),
        },
    )))
}

fn require_field(value: &Option<String>, field: &str) -> AppResult<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::missing_field(field))
}

fn require_after_charge(
    value: &Option<String>,
    field: &str,
    rec_trade_id: &str,
) -> AppResult<String> {
    require_field(value, field).map_err(|err| {
        warn!(
            rec_trade_id = %rec_trade_id,
            field,
            "Charge captured but provisioning input is invalid"
        );
        err
    })
}

fn generate_order_no() -> String {
    let suffix = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("ES{}{}", chrono::Utc::now().format("%Y%m%d%H%M%S"), &suffix[..6])
}

fn value_to_decimal(value: &Value) -> Option<BigDecimal> {
    match value {
        Value::String(s) => BigDecimal::from_str(s).ok(),
        Value::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_card_takes_precedence_over_prime() {
        let request = CheckoutRequest {
            prime: Some("prime-123".to_string()),
            card_key: Some("key".to_string()),
            card_token: Some("token".to_string()),
            ..Default::default()
        };
        match resolve_payment_method(&request).unwrap() {
            PaymentMethod::BoundCard { card_key, .. } => assert_eq!(card_key, "key"),
            PaymentMethod::Prime(_) => panic!("bound card must win"),
        }
    }

    #[test]
    fn incomplete_card_pair_falls_back_to_prime() {
        let request = CheckoutRequest {
            prime: Some("prime-123".to_string()),
            card_key: Some("key".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            resolve_payment_method(&request).unwrap(),
            PaymentMethod::Prime(_)
        ));
    }

    #[test]
    fn no_payment_method_is_a_validation_error() {
        let err = resolve_payment_method(&CheckoutRequest::default()).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn order_numbers_are_unique_and_prefixed() {
        let a = generate_order_no();
        let b = generate_order_no();
        assert!(a.starts_with("ES"));
        assert_ne!(a, b);
    }

    #[test]
    fn net_price_reads_string_and_number_payloads() {
        let mut extra = serde_json::Map::new();
        extra.insert("price".to_string(), serde_json::json!("4.50"));
        let provisioned = Provisioned::Order(crate::esim::types::ProviderOrder {
            id: 1,
            code: "c".to_string(),
            package_id: "p".to_string(),
            currency: None,
            sims: vec![],
            extra,
        });
        assert_eq!(provisioned.net_price(), BigDecimal::from_str("4.50").unwrap());

        let mut extra = serde_json::Map::new();
        extra.insert("price".to_string(), serde_json::json!(7.5));
        let provisioned = Provisioned::Topup(crate::esim::types::TopupOrder {
            id: 2,
            code: "c".to_string(),
            package_id: "p".to_string(),
            iccid: None,
            extra,
        });
        assert_eq!(provisioned.net_price(), BigDecimal::from_str("7.5").unwrap());
    }
}
