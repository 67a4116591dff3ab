pub mod invoice_retry;

pub use invoice_retry::InvoiceRetryWorker;
