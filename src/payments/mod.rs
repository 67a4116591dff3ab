//! Card gateway (TapPay) integration: charges, card binding and removal.

pub mod error;
pub mod gateway;
pub mod types;

pub use error::{PaymentError, PaymentResult};
pub use gateway::{CardGateway, TapPayClient};
