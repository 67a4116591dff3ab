//! Checkout scenarios against in-memory fakes: the full happy path, the
//! provisioning-failed path that must keep the captured charge visible,
//! and invoice degradation.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde_json::{json, Value};
use uuid::Uuid;

use esim_storefront_backend::database::error::DatabaseError;
use esim_storefront_backend::database::order_repository::{
    InvoiceStatus, NewOrder, NewOrderDetail, Order, OrderDetail, OrderStore,
};
use esim_storefront_backend::database::profile_repository::{ProfileStore, UserProfile};
use esim_storefront_backend::esim::client::EsimGateway;
use esim_storefront_backend::esim::error::{EsimError, EsimResult};
use esim_storefront_backend::esim::pricing::PriceBook;
use esim_storefront_backend::esim::types::{
    InstructionSet, ProviderOrder, ProviderSim, SubmitOrderRequest, SubmitTopupRequest,
    TopupOrder, TopupPackage, UsageSnapshot,
};
use esim_storefront_backend::invoice::{
    InvoiceError, InvoiceIssuer, InvoiceRequest, InvoiceResult, IssuedInvoice,
};
use esim_storefront_backend::payments::types::{
    BindCardRequest, BoundCard, CardSecret, ChargeOutcome, ChargeRequest, PaymentMethod,
};
use esim_storefront_backend::payments::{CardGateway, PaymentError, PaymentResult};
use esim_storefront_backend::services::{CheckoutRequest, CheckoutService, TopupOrderRequest};

// ---- fakes ----

struct FakeCardGateway {
    decline: bool,
    with_card_secret: bool,
    charges: Mutex<Vec<ChargeRequest>>,
}

impl FakeCardGateway {
    fn approving() -> Self {
        Self {
            decline: false,
            with_card_secret: false,
            charges: Mutex::new(Vec::new()),
        }
    }

    fn declining() -> Self {
        Self {
            decline: true,
            with_card_secret: false,
            charges: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CardGateway for FakeCardGateway {
    async fn charge(
        &self,
        _method: &PaymentMethod,
        request: &ChargeRequest,
    ) -> PaymentResult<ChargeOutcome> {
        self.charges.lock().unwrap().push(request.clone());
        if self.decline {
            return Err(PaymentError::Declined {
                gateway_status: 10003,
                message: "Parameter amount is invalid".to_string(),
                raw: json!({"status": 10003, "msg": "Parameter amount is invalid"}),
            });
        }
        Ok(ChargeOutcome {
            rec_trade_id: "REC123".to_string(),
            bank_transaction_id: Some("BANK456".to_string()),
            card_secret: self.with_card_secret.then(|| CardSecret {
                card_key: "ck".to_string(),
                card_token: "ct".to_string(),
            }),
            raw: json!({"status": 0, "rec_trade_id": "REC123"}),
        })
    }

    async fn bind_card(&self, _request: &BindCardRequest) -> PaymentResult<BoundCard> {
        unreachable!("not used by checkout")
    }

    async fn remove_card(&self, _card: &CardSecret) -> PaymentResult<Value> {
        unreachable!("not used by checkout")
    }
}

struct FakeEsimGateway {
    fail_provisioning: bool,
}

fn sample_sim() -> ProviderSim {
    ProviderSim {
        iccid: "8988228066612345678".to_string(),
        lpa: Some("lpa.example.com".to_string()),
        matching_id: Some("MATCH-1".to_string()),
        qrcode: Some("LPA:1$lpa.example.com$MATCH-1".to_string()),
        qrcode_url: None,
        apn_type: Some("automatic".to_string()),
        apn_value: Some("internet".to_string()),
        is_roaming: Some(true),
        confirmation_code: None,
        apn: None,
        extra: serde_json::Map::new(),
    }
}

#[async_trait]
impl EsimGateway for FakeEsimGateway {
    async fn submit_order(&self, request: SubmitOrderRequest) -> EsimResult<ProviderOrder> {
        if self.fail_provisioning {
            return Err(EsimError::HttpError {
                status: 422,
                message: "package out of stock".to_string(),
                body: Some(json!({"message": "package out of stock"})),
                retryable: false,
            });
        }
        let mut extra = serde_json::Map::new();
        extra.insert("price".to_string(), json!("4.50"));
        Ok(ProviderOrder {
            id: 42,
            code: "ORD-42".to_string(),
            package_id: request.package_id,
            currency: Some("USD".to_string()),
            sims: vec![sample_sim()],
            extra,
        })
    }

    async fn submit_topup_order(&self, request: SubmitTopupRequest) -> EsimResult<TopupOrder> {
        if self.fail_provisioning {
            return Err(EsimError::NetworkError {
                message: "connection reset".to_string(),
            });
        }
        let mut extra = serde_json::Map::new();
        extra.insert("price".to_string(), json!(7.5));
        Ok(TopupOrder {
            id: 43,
            code: "TOP-43".to_string(),
            package_id: request.package_id,
            iccid: Some(request.iccid),
            extra,
        })
    }

    async fn get_usage(&self, _iccid: &str) -> EsimResult<UsageSnapshot> {
        unreachable!("not used by checkout")
    }

    async fn get_topup_packages(&self, _iccid: &str) -> EsimResult<Vec<TopupPackage>> {
        unreachable!("not used by checkout")
    }

    async fn get_install_instructions(
        &self,
        _iccid: &str,
        _language: &str,
    ) -> EsimResult<InstructionSet> {
        unreachable!("not used by checkout")
    }
}

#[derive(Default)]
struct InMemoryOrderStore {
    orders: Mutex<Vec<Order>>,
    known_iccids: Vec<String>,
}

impl InMemoryOrderStore {
    fn with_known_iccid(iccid: &str) -> Self {
        Self {
            orders: Mutex::new(Vec::new()),
            known_iccids: vec![iccid.to_string()],
        }
    }

    fn orders(&self) -> Vec<Order> {
        self.orders.lock().unwrap().clone()
    }

    fn materialize(order: NewOrder) -> Order {
        let now = chrono::Utc::now();
        Order {
            id: Uuid::new_v4(),
            order_no: order.order_no,
            user_id: order.user_id,
            order_type: order.order_type,
            package_id: order.package_id,
            quantity: order.quantity,
            iccid: order.iccid,
            net_price: order.net_price,
            sell_price: order.sell_price,
            currency: order.currency,
            status: order.status.as_str().to_string(),
            pay_trade_id: order.pay_trade_id,
            payment_response: order.payment_response,
            provider_order_id: order.provider_order_id,
            provider_response: order.provider_response,
            invoice_status: order.invoice_status.as_str().to_string(),
            invoice_number: None,
            invoice_random_code: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_order(&self, order: NewOrder) -> Result<Order, DatabaseError> {
        let order = Self::materialize(order);
        self.orders.lock().unwrap().push(order.clone());
        Ok(order)
    }

    async fn create_order_with_details(
        &self,
        order: NewOrder,
        details: Vec<NewOrderDetail>,
    ) -> Result<(Order, Vec<OrderDetail>), DatabaseError> {
        let order = Self::materialize(order);
        self.orders.lock().unwrap().push(order.clone());
        let now = chrono::Utc::now();
        let details = details
            .into_iter()
            .map(|d| OrderDetail {
                id: Uuid::new_v4(),
                order_id: order.id,
                iccid: d.iccid,
                lpa: d.lpa,
                matching_id: d.matching_id,
                qrcode: d.qrcode,
                qrcode_url: d.qrcode_url,
                apn_type: d.apn_type,
                apn_value: d.apn_value,
                is_roaming: d.is_roaming,
                confirmation_code: d.confirmation_code,
                apn: d.apn,
                created_at: now,
                updated_at: now,
            })
            .collect();
        Ok((order, details))
    }

    async fn find_detail_by_iccid(
        &self,
        iccid: &str,
    ) -> Result<Option<OrderDetail>, DatabaseError> {
        if !self.known_iccids.iter().any(|known| known == iccid) {
            return Ok(None);
        }
        let now = chrono::Utc::now();
        Ok(Some(OrderDetail {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            iccid: iccid.to_string(),
            lpa: None,
            matching_id: None,
            qrcode: None,
            qrcode_url: None,
            apn_type: None,
            apn_value: None,
            is_roaming: None,
            confirmation_code: None,
            apn: None,
            created_at: now,
            updated_at: now,
        }))
    }

    async fn update_invoice_result(
        &self,
        order_id: Uuid,
        invoice_status: InvoiceStatus,
        invoice_number: Option<&str>,
        invoice_random_code: Option<&str>,
    ) -> Result<Order, DatabaseError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| DatabaseError::not_found("order", order_id.to_string()))?;
        order.invoice_status = invoice_status.as_str().to_string();
        order.invoice_number = invoice_number.map(str::to_string);
        order.invoice_random_code = invoice_random_code.map(str::to_string);
        Ok(order.clone())
    }

    async fn find_invoice_failed(&self, limit: i64) -> Result<Vec<Order>, DatabaseError> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.invoice_status == "failed")
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct FakeProfileStore {
    saved_cards: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl ProfileStore for FakeProfileStore {
    async fn find_by_user_id(&self, _user_id: &str) -> Result<Option<UserProfile>, DatabaseError> {
        Ok(None)
    }

    async fn upsert_contact(
        &self,
        _user_id: &str,
        _email: Option<&str>,
        _invoice_carrier: Option<&str>,
    ) -> Result<UserProfile, DatabaseError> {
        unreachable!("not used by checkout")
    }

    async fn set_card(
        &self,
        user_id: &str,
        card_key: &str,
        card_token: &str,
        _card_last_four: Option<&str>,
    ) -> Result<UserProfile, DatabaseError> {
        self.saved_cards.lock().unwrap().push((
            user_id.to_string(),
            card_key.to_string(),
            card_token.to_string(),
        ));
        let now = chrono::Utc::now();
        Ok(UserProfile {
            user_id: user_id.to_string(),
            email: None,
            invoice_carrier: None,
            card_key: Some(card_key.to_string()),
            card_token: Some(card_token.to_string()),
            card_last_four: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn clear_card(&self, _user_id: &str) -> Result<bool, DatabaseError> {
        Ok(true)
    }
}

struct FakeInvoiceIssuer {
    fail: bool,
    requests: Mutex<Vec<InvoiceRequest>>,
}

impl FakeInvoiceIssuer {
    fn issuing() -> Self {
        Self {
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl InvoiceIssuer for FakeInvoiceIssuer {
    async fn issue(&self, request: &InvoiceRequest) -> InvoiceResult<IssuedInvoice> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(InvoiceError::NetworkError {
                message: "invoice service unreachable".to_string(),
            });
        }
        Ok(IssuedInvoice {
            invoice_number: "AB12345678".to_string(),
            random_code: Some("4821".to_string()),
            raw: json!({"status": 0}),
        })
    }
}

struct Harness {
    cards: Arc<FakeCardGateway>,
    orders: Arc<InMemoryOrderStore>,
    profiles: Arc<FakeProfileStore>,
    invoices: Arc<FakeInvoiceIssuer>,
    service: CheckoutService,
}

fn harness(
    cards: FakeCardGateway,
    provider: FakeEsimGateway,
    orders: InMemoryOrderStore,
    invoices: FakeInvoiceIssuer,
) -> Harness {
    let cards = Arc::new(cards);
    let orders = Arc::new(orders);
    let profiles = Arc::new(FakeProfileStore::default());
    let invoices = Arc::new(invoices);
    let service = CheckoutService::new(
        cards.clone(),
        Arc::new(provider),
        orders.clone(),
        profiles.clone(),
        invoices.clone(),
        Arc::new(PriceBook::load(None).unwrap()),
        "TWD".to_string(),
        true,
    );
    Harness {
        cards,
        orders,
        profiles,
        invoices,
        service,
    }
}

fn purchase_request() -> CheckoutRequest {
    CheckoutRequest {
        user_id: Some("U1".to_string()),
        package_id: Some("kr-7days-1gb".to_string()),
        quantity: Some(1),
        amount: Some(500),
        prime: Some("prime-abc".to_string()),
        email: Some("buyer@example.com".to_string()),
        ..Default::default()
    }
}

// ---- scenarios ----

#[tokio::test]
async fn purchase_charges_provisions_persists_and_invoices() {
    let h = harness(
        FakeCardGateway::approving(),
        FakeEsimGateway {
            fail_provisioning: false,
        },
        InMemoryOrderStore::default(),
        FakeInvoiceIssuer::issuing(),
    );

    let response = h.service.process_payment(purchase_request()).await.unwrap();

    assert_eq!(response.status, "provisioned");
    assert_eq!(response.order_type, "sim");
    assert_eq!(response.rec_trade_id.as_deref(), Some("REC123"));
    assert_eq!(response.provider_order_id.as_deref(), Some("ORD-42"));
    assert_eq!(response.sims.len(), 1);
    assert_eq!(response.sims[0].iccid, "8988228066612345678");

    assert!(response.invoice.success);
    assert_eq!(response.invoice.status, "issued");
    assert_eq!(response.invoice.invoice_number.as_deref(), Some("AB12345678"));

    let orders = h.orders.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, "provisioned");
    assert_eq!(orders[0].invoice_status, "issued");
    assert_eq!(orders[0].net_price, "4.50".parse::<BigDecimal>().unwrap());
    assert_eq!(h.invoices.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn declined_charge_stops_everything() {
    let h = harness(
        FakeCardGateway::declining(),
        FakeEsimGateway {
            fail_provisioning: false,
        },
        InMemoryOrderStore::default(),
        FakeInvoiceIssuer::issuing(),
    );

    let err = h
        .service
        .process_payment(purchase_request())
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 402);
    assert!(!err.is_retryable());
    // the gateway response travels verbatim
    assert_eq!(err.details().unwrap()["status"], 10003);
    assert!(h.orders.orders().is_empty());
}

#[tokio::test]
async fn provisioning_failure_keeps_captured_charge_visible() {
    let h = harness(
        FakeCardGateway::approving(),
        FakeEsimGateway {
            fail_provisioning: true,
        },
        InMemoryOrderStore::default(),
        FakeInvoiceIssuer::issuing(),
    );

    let err = h
        .service
        .process_payment(purchase_request())
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 502);
    // the payment response rides along so support can find the charge
    assert_eq!(err.details().unwrap()["rec_trade_id"], "REC123");

    let orders = h.orders.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, "payment_captured_provisioning_failed");
    assert_eq!(orders[0].pay_trade_id.as_deref(), Some("REC123"));
    assert_eq!(orders[0].invoice_status, "skipped");
    assert_eq!(h.invoices.requests.lock().unwrap().len(), 0);
}

#[tokio::test]
async fn invoice_failure_degrades_but_checkout_succeeds() {
    let h = harness(
        FakeCardGateway::approving(),
        FakeEsimGateway {
            fail_provisioning: false,
        },
        InMemoryOrderStore::default(),
        FakeInvoiceIssuer::failing(),
    );

    let response = h.service.process_payment(purchase_request()).await.unwrap();

    assert_eq!(response.status, "provisioned");
    assert!(!response.invoice.success);
    assert_eq!(response.invoice.status, "failed");
    assert!(response.invoice.error.is_some());

    let orders = h.orders.orders();
    assert_eq!(orders[0].invoice_status, "failed");
}

#[tokio::test]
async fn remember_card_stores_gateway_credentials() {
    let mut cards = FakeCardGateway::approving();
    cards.with_card_secret = true;
    let h = harness(
        cards,
        FakeEsimGateway {
            fail_provisioning: false,
        },
        InMemoryOrderStore::default(),
        FakeInvoiceIssuer::issuing(),
    );

    let mut request = purchase_request();
    request.remember = Some(true);
    h.service.process_payment(request).await.unwrap();

    let saved = h.profiles.saved_cards.lock().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0], ("U1".to_string(), "ck".to_string(), "ct".to_string()));
}

#[tokio::test]
async fn charge_uses_the_generated_order_number() {
    let h = harness(
        FakeCardGateway::approving(),
        FakeEsimGateway {
            fail_provisioning: false,
        },
        InMemoryOrderStore::default(),
        FakeInvoiceIssuer::issuing(),
    );

    let response = h.service.process_payment(purchase_request()).await.unwrap();

    let charges = h.cards.charges.lock().unwrap();
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].order_number, response.order_no);
}

#[tokio::test]
async fn topup_order_rejects_unknown_iccid() {
    let h = harness(
        FakeCardGateway::approving(),
        FakeEsimGateway {
            fail_provisioning: false,
        },
        InMemoryOrderStore::default(),
        FakeInvoiceIssuer::issuing(),
    );

    let err = h
        .service
        .provision_topup(TopupOrderRequest {
            user_id: Some("U1".to_string()),
            package_id: Some("kr-topup-1gb".to_string()),
            iccid: Some("8988000000000000000".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 400);
    assert!(h.orders.orders().is_empty());
}

#[tokio::test]
async fn topup_order_provisions_without_charging() {
    let h = harness(
        FakeCardGateway::approving(),
        FakeEsimGateway {
            fail_provisioning: false,
        },
        InMemoryOrderStore::with_known_iccid("8988228066612345678"),
        FakeInvoiceIssuer::issuing(),
    );

    let response = h
        .service
        .provision_topup(TopupOrderRequest {
            user_id: Some("U1".to_string()),
            package_id: Some("kr-topup-1gb".to_string()),
            iccid: Some("8988228066612345678".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(response.order_type, "topup");
    assert!(response.rec_trade_id.is_none());
    assert!(h.cards.charges.lock().unwrap().is_empty());

    let orders = h.orders.orders();
    assert_eq!(orders.len(), 1);
    assert!(orders[0].pay_trade_id.is_none());
    assert_eq!(orders[0].net_price, "7.5".parse::<BigDecimal>().unwrap());
}
