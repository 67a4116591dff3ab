use crate::database::error::DatabaseError;
use async_trait::async_trait;
use sqlx::{types::BigDecimal, FromRow, PgPool};
use uuid::Uuid;

/// Order lifecycle states.
///
/// Orders are only written after the charge has been attempted, so there
/// is no transient "created" state. A captured payment whose provisioning
/// failed is kept distinct so support can tell refund candidates apart
/// from healthy orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Provisioned,
    PaymentCapturedProvisioningFailed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Provisioned => "provisioned",
            OrderStatus::PaymentCapturedProvisioningFailed => {
                "payment_captured_provisioning_failed"
            }
        }
    }
}

/// Invoice lifecycle states, tracked per order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    Pending,
    Issued,
    Failed,
    Skipped,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::Failed => "failed",
            InvoiceStatus::Skipped => "skipped",
        }
    }
}

/// Order entity
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_no: String,
    pub user_id: String,
    pub order_type: String,
    pub package_id: String,
    pub quantity: i32,
    pub iccid: Option<String>,
    pub net_price: BigDecimal,
    pub sell_price: BigDecimal,
    pub currency: String,
    pub status: String,
    pub pay_trade_id: Option<String>,
    pub payment_response: Option<serde_json::Value>,
    pub provider_order_id: Option<String>,
    pub provider_response: Option<serde_json::Value>,
    pub invoice_status: String,
    pub invoice_number: Option<String>,
    pub invoice_random_code: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Fields supplied when inserting an order
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_no: String,
    pub user_id: String,
    pub order_type: String,
    pub package_id: String,
    pub quantity: i32,
    pub iccid: Option<String>,
    pub net_price: BigDecimal,
    pub sell_price: BigDecimal,
    pub currency: String,
    pub status: OrderStatus,
    pub pay_trade_id: Option<String>,
    pub payment_response: Option<serde_json::Value>,
    pub provider_order_id: Option<String>,
    pub provider_response: Option<serde_json::Value>,
    pub invoice_status: InvoiceStatus,
}

/// One provisioned SIM under an order
#[derive(Debug, Clone, FromRow)]
pub struct OrderDetail {
    pub id: Uuid,
    pub order_id: Uuid,
    pub iccid: String,
    pub lpa: Option<String>,
    pub matching_id: Option<String>,
    pub qrcode: Option<String>,
    pub qrcode_url: Option<String>,
    pub apn_type: Option<String>,
    pub apn_value: Option<String>,
    pub is_roaming: Option<bool>,
    pub confirmation_code: Option<String>,
    pub apn: Option<serde_json::Value>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Fields supplied when inserting an order detail
#[derive(Debug, Clone)]
pub struct NewOrderDetail {
    pub iccid: String,
    pub lpa: Option<String>,
    pub matching_id: Option<String>,
    pub qrcode: Option<String>,
    pub qrcode_url: Option<String>,
    pub apn_type: Option<String>,
    pub apn_value: Option<String>,
    pub is_roaming: Option<bool>,
    pub confirmation_code: Option<String>,
    pub apn: Option<serde_json::Value>,
}

/// Persistence seam for order data. The checkout flow and the invoice
/// retry worker only see this trait, which keeps them testable without a
/// live database.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create_order(&self, order: NewOrder) -> Result<Order, DatabaseError>;

    /// Insert the order and its SIM details in one transaction. Either
    /// everything lands or nothing does.
    async fn create_order_with_details(
        &self,
        order: NewOrder,
        details: Vec<NewOrderDetail>,
    ) -> Result<(Order, Vec<OrderDetail>), DatabaseError>;

    async fn find_detail_by_iccid(
        &self,
        iccid: &str,
    ) -> Result<Option<OrderDetail>, DatabaseError>;

    async fn update_invoice_result(
        &self,
        order_id: Uuid,
        invoice_status: InvoiceStatus,
        invoice_number: Option<&str>,
        invoice_random_code: Option<&str>,
    ) -> Result<Order, DatabaseError>;

    /// Orders whose invoice issuance failed, oldest first
    async fn find_invoice_failed(&self, limit: i64) -> Result<Vec<Order>, DatabaseError>;
}

/// Repository for orders and their SIM details
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find an order by its public order number
    pub async fn find_by_order_no(&self, order_no: &str) -> Result<Option<Order>, DatabaseError> {
        sqlx::query_as::<_, Order>(
            "SELECT id, order_no, user_id, order_type, package_id, quantity, iccid,
                    net_price, sell_price, currency, status, pay_trade_id, payment_response,
                    provider_order_id, provider_response, invoice_status, invoice_number,
                    invoice_random_code, created_at, updated_at
             FROM orders
             WHERE order_no = $1",
        )
        .bind(order_no)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// All SIM details under an order
    pub async fn find_details_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<OrderDetail>, DatabaseError> {
        sqlx::query_as::<_, OrderDetail>(
            "SELECT id, order_id, iccid, lpa, matching_id, qrcode, qrcode_url, apn_type,
                    apn_value, is_roaming, confirmation_code, apn, created_at, updated_at
             FROM order_details
             WHERE order_id = $1
             ORDER BY created_at ASC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn create_order(&self, order: NewOrder) -> Result<Order, DatabaseError> {
        sqlx::query_as::<_, Order>(
            "INSERT INTO orders
             (order_no, user_id, order_type, package_id, quantity, iccid, net_price,
              sell_price, currency, status, pay_trade_id, payment_response,
              provider_order_id, provider_response, invoice_status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             RETURNING id, order_no, user_id, order_type, package_id, quantity, iccid,
                       net_price, sell_price, currency, status, pay_trade_id, payment_response,
                       provider_order_id, provider_response, invoice_status, invoice_number,
                       invoice_random_code, created_at, updated_at",
        )
        .bind(&order.order_no)
        .bind(&order.user_id)
        .bind(&order.order_type)
        .bind(&order.package_id)
        .bind(order.quantity)
        .bind(&order.iccid)
        .bind(&order.net_price)
        .bind(&order.sell_price)
        .bind(&order.currency)
        .bind(order.status.as_str())
        .bind(&order.pay_trade_id)
        .bind(&order.payment_response)
        .bind(&order.provider_order_id)
        .bind(&order.provider_response)
        .bind(order.invoice_status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn create_order_with_details(
        &self,
        order: NewOrder,
        details: Vec<NewOrderDetail>,
    ) -> Result<(Order, Vec<OrderDetail>), DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let created = sqlx::query_as::<_, Order>(
            "INSERT INTO orders
             (order_no, user_id, order_type, package_id, quantity, iccid, net_price,
              sell_price, currency, status, pay_trade_id, payment_response,
              provider_order_id, provider_response, invoice_status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             RETURNING id, order_no, user_id, order_type, package_id, quantity, iccid,
                       net_price, sell_price, currency, status, pay_trade_id, payment_response,
                       provider_order_id, provider_response, invoice_status, invoice_number,
                       invoice_random_code, created_at, updated_at",
        )
        .bind(&order.order_no)
        .bind(&order.user_id)
        .bind(&order.order_type)
        .bind(&order.package_id)
        .bind(order.quantity)
        .bind(&order.iccid)
        .bind(&order.net_price)
        .bind(&order.sell_price)
        .bind(&order.currency)
        .bind(order.status.as_str())
        .bind(&order.pay_trade_id)
        .bind(&order.payment_response)
        .bind(&order.provider_order_id)
        .bind(&order.provider_response)
        .bind(order.invoice_status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let mut created_details = Vec::with_capacity(details.len());
        for detail in &details {
            let row = sqlx::query_as::<_, OrderDetail>(
                "INSERT INTO order_details
                 (order_id, iccid, lpa, matching_id, qrcode, qrcode_url, apn_type,
                  apn_value, is_roaming, confirmation_code, apn)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                 RETURNING id, order_id, iccid, lpa, matching_id, qrcode, qrcode_url, apn_type,
                           apn_value, is_roaming, confirmation_code, apn, created_at, updated_at",
            )
            .bind(created.id)
            .bind(&detail.iccid)
            .bind(&detail.lpa)
            .bind(&detail.matching_id)
            .bind(&detail.qrcode)
            .bind(&detail.qrcode_url)
            .bind(&detail.apn_type)
            .bind(&detail.apn_value)
            .bind(detail.is_roaming)
            .bind(&detail.confirmation_code)
            .bind(&detail.apn)
            .fetch_one(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;
            created_details.push(row);
        }

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok((created, created_details))
    }

    async fn find_detail_by_iccid(
        &self,
        iccid: &str,
    ) -> Result<Option<OrderDetail>, DatabaseError> {
        sqlx::query_as::<_, OrderDetail>(
            "SELECT id, order_id, iccid, lpa, matching_id, qrcode, qrcode_url, apn_type,
                    apn_value, is_roaming, confirmation_code, apn, created_at, updated_at
             FROM order_details
             WHERE iccid = $1",
        )
        .bind(iccid)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn update_invoice_result(
        &self,
        order_id: Uuid,
        invoice_status: InvoiceStatus,
        invoice_number: Option<&str>,
        invoice_random_code: Option<&str>,
    ) -> Result<Order, DatabaseError> {
        sqlx::query_as::<_, Order>(
            "UPDATE orders
             SET invoice_status = $2, invoice_number = $3, invoice_random_code = $4,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING id, order_no, user_id, order_type, package_id, quantity, iccid,
                       net_price, sell_price, currency, status, pay_trade_id, payment_response,
                       provider_order_id, provider_response, invoice_status, invoice_number,
                       invoice_random_code, created_at, updated_at",
        )
        .bind(order_id)
        .bind(invoice_status.as_str())
        .bind(invoice_number)
        .bind(invoice_random_code)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_invoice_failed(&self, limit: i64) -> Result<Vec<Order>, DatabaseError> {
        sqlx::query_as::<_, Order>(
            "SELECT id, order_no, user_id, order_type, package_id, quantity, iccid,
                    net_price, sell_price, currency, status, pay_trade_id, payment_response,
                    provider_order_id, provider_response, invoice_status, invoice_number,
                    invoice_random_code, created_at, updated_at
             FROM orders
             WHERE invoice_status = 'failed'
             ORDER BY created_at ASC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_strings() {
        assert_eq!(OrderStatus::Provisioned.as_str(), "provisioned");
        assert_eq!(
            OrderStatus::PaymentCapturedProvisioningFailed.as_str(),
            "payment_captured_provisioning_failed"
        );
    }

    #[test]
    fn test_invoice_status_strings() {
        assert_eq!(InvoiceStatus::Pending.as_str(), "pending");
        assert_eq!(InvoiceStatus::Issued.as_str(), "issued");
        assert_eq!(InvoiceStatus::Failed.as_str(), "failed");
        assert_eq!(InvoiceStatus::Skipped.as_str(), "skipped");
    }
}
