//! E-invoice service integration: issuance client, required-field
//! validation and the shared carrier classifier.

pub mod carrier;
pub mod client;
pub mod error;

pub use carrier::CarrierKind;
pub use client::{InvoiceClient, InvoiceDetailLine, InvoiceIssuer, InvoiceRequest, IssuedInvoice};
pub use error::{InvoiceError, InvoiceResult};
