//! Invoice request assembly from persisted orders.
//!
//! Checkout issues invoices inline and the retry worker re-issues them
//! later; both build the request here so a retried invoice matches the
//! one that failed.

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};

use crate::database::order_repository::Order;
use crate::invoice::{InvoiceDetailLine, InvoiceRequest};

const INVOICE_TYPE_B2C: &str = "B2C";

/// VAT rate embedded in the sell price, in percent
const TAX_RATE_PERCENT: i64 = 5;

pub fn invoice_request_for_order(
    order: &Order,
    buyer_email: &str,
    carrier: Option<String>,
) -> InvoiceRequest {
    let total = whole_units(&order.sell_price);
    let quantity = i64::from(order.quantity.max(1));

    InvoiceRequest {
        order_number: order.order_no.clone(),
        order_date: order.created_at.format("%Y/%m/%d").to_string(),
        buyer_email: buyer_email.to_string(),
        currency: order.currency.clone(),
        invoice_type: INVOICE_TYPE_B2C.to_string(),
        sales_amount: total,
        zero_tax_amount: 0,
        free_tax_amount: 0,
        tax_amount: included_tax(total),
        details: detail_lines(&order.package_id, total, quantity),
        carrier,
    }
}

/// Detail lines that sum exactly to the total. A total that does not
/// divide evenly puts the remainder on a separate rounding line, so each
/// line keeps `unit_price x quantity == amount`.
fn detail_lines(description: &str, total: i64, quantity: i64) -> Vec<InvoiceDetailLine> {
    let unit_price = total / quantity;
    let remainder = total - unit_price * quantity;

    let mut lines = vec![InvoiceDetailLine {
        description: description.to_string(),
        quantity,
        unit_price,
        amount: unit_price * quantity,
    }];
    if remainder > 0 {
        lines.push(InvoiceDetailLine {
            description: format!("{} (rounding)", description),
            quantity: 1,
            unit_price: remainder,
            amount: remainder,
        });
    }
    lines
}

/// Sell price rounded half-up to whole currency units
fn whole_units(price: &BigDecimal) -> i64 {
    price
        .with_scale_round(0, RoundingMode::HalfUp)
        .to_i64()
        .unwrap_or(0)
}

/// Tax portion of a tax-included total
fn included_tax(total: i64) -> i64 {
    let tax = BigDecimal::from(total * TAX_RATE_PERCENT) / BigDecimal::from(100 + TAX_RATE_PERCENT);
    tax.with_scale_round(0, RoundingMode::HalfUp)
        .to_i64()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::str::FromStr;
    use uuid::Uuid;

    fn order(sell_price: &str, quantity: i32) -> Order {
        let now = Utc.with_ymd_and_hms(2025, 8, 1, 12, 0, 0).unwrap();
        Order {
            id: Uuid::new_v4(),
            order_no: "ES20250801120000ABC".to_string(),
            user_id: "user-1".to_string(),
            order_type: "sim".to_string(),
            package_id: "jang-7days-1gb".to_string(),
            quantity,
            iccid: None,
            net_price: BigDecimal::from_str("4.5").unwrap(),
            sell_price: BigDecimal::from_str(sell_price).unwrap(),
            currency: "TWD".to_string(),
            status: "provisioned".to_string(),
            pay_trade_id: Some("D20250801aaaa".to_string()),
            payment_response: None,
            provider_order_id: Some("20250801-012345".to_string()),
            provider_response: None,
            invoice_status: "pending".to_string(),
            invoice_number: None,
            invoice_random_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn request_carries_order_fields() {
        let request = invoice_request_for_order(&order("500", 1), "buyer@example.com", None);
        assert_eq!(request.order_number, "ES20250801120000ABC");
        assert_eq!(request.order_date, "2025/08/01");
        assert_eq!(request.sales_amount, 500);
        assert_eq!(request.details.len(), 1);
        assert_eq!(request.details[0].description, "jang-7days-1gb");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn fractional_sell_price_rounds_half_up() {
        let request = invoice_request_for_order(&order("499.5", 1), "buyer@example.com", None);
        assert_eq!(request.sales_amount, 500);
    }

    #[test]
    fn tax_is_the_included_portion() {
        // 500 at 5% included: 500 - 500/1.05 = 23.8 -> 24
        let request = invoice_request_for_order(&order("500", 1), "buyer@example.com", None);
        assert_eq!(request.tax_amount, 24);
    }

    #[test]
    fn unit_price_divides_by_quantity() {
        let request = invoice_request_for_order(&order("600", 2), "buyer@example.com", None);
        assert_eq!(request.details.len(), 1);
        assert_eq!(request.details[0].quantity, 2);
        assert_eq!(request.details[0].unit_price, 300);
        assert_eq!(request.details[0].amount, 600);
    }

    #[test]
    fn uneven_division_carries_the_remainder_on_a_rounding_line() {
        // 500 over 3 units: 166 x 3 = 498, remainder 2
        let request = invoice_request_for_order(&order("500", 3), "buyer@example.com", None);
        assert_eq!(request.details.len(), 2);
        assert_eq!(request.details[0].unit_price, 166);
        assert_eq!(request.details[0].amount, 498);
        assert_eq!(request.details[1].quantity, 1);
        assert_eq!(request.details[1].amount, 2);

        let line_total: i64 = request.details.iter().map(|line| line.amount).sum();
        assert_eq!(line_total, request.sales_amount);
    }
}
