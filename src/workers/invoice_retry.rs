//! Background re-issuance of failed invoices.
//!
//! Invoice issuance is best-effort during checkout; orders left with
//! `invoice_status = failed` are picked up here in bounded batches and
//! retried until the invoice service accepts them.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::database::order_repository::{InvoiceStatus, Order, OrderStore};
use crate::database::profile_repository::ProfileStore;
use crate::invoice::InvoiceIssuer;
use crate::services::invoicing::invoice_request_for_order;

pub const DEFAULT_INTERVAL_SECS: u64 = 300;
pub const BATCH_SIZE: i64 = 50;

pub struct InvoiceRetryWorker {
    orders: Arc<dyn OrderStore>,
    profiles: Arc<dyn ProfileStore>,
    issuer: Arc<dyn InvoiceIssuer>,
    interval_secs: u64,
}

impl InvoiceRetryWorker {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        profiles: Arc<dyn ProfileStore>,
        issuer: Arc<dyn InvoiceIssuer>,
        interval_secs: u64,
    ) -> Self {
        Self {
            orders,
            profiles,
            issuer,
            interval_secs,
        }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_secs(self.interval_secs));
        info!(
            interval_secs = self.interval_secs,
            batch = BATCH_SIZE,
            "Invoice retry worker started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.process_batch().await {
                        Ok(reissued) => {
                            if reissued > 0 {
                                info!(reissued, "Re-issued failed invoices");
                            }
                        }
                        Err(err) => {
                            error!(error = %err, "Invoice retry batch failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Invoice retry worker shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// One pass over the oldest failed invoices. Per-order failures are
    /// logged and left failed for the next tick.
    async fn process_batch(&self) -> Result<usize, crate::database::error::DatabaseError> {
        let failed = self.orders.find_invoice_failed(BATCH_SIZE).await?;
        let mut reissued = 0;

        for order in failed {
            match self.reissue(&order).await {
                Ok(()) => reissued += 1,
                Err(err) => {
                    warn!(order_no = %order.order_no, error = %err, "Invoice re-issue failed");
                }
            }
        }

        Ok(reissued)
    }

    async fn reissue(&self, order: &Order) -> anyhow::Result<()> {
        let profile = self.profiles.find_by_user_id(&order.user_id).await?;
        let (email, carrier) = match profile {
            Some(profile) => (
                profile.email.unwrap_or_default(),
                profile.invoice_carrier,
            ),
            None => (String::new(), None),
        };

        let request = invoice_request_for_order(order, &email, carrier);
        let issued = self.issuer.issue(&request).await?;

        self.orders
            .update_invoice_result(
                order.id,
                InvoiceStatus::Issued,
                Some(&issued.invoice_number),
                issued.random_code.as_deref(),
            )
            .await?;

        info!(
            order_no = %order.order_no,
            invoice_number = %issued.invoice_number,
            "Invoice re-issued"
        );
        Ok(())
    }
}
