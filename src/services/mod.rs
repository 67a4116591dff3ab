//! Business logic, one service per storefront concern. Services depend
//! on trait seams (gateways and stores), not concrete clients, so every
//! flow is testable with in-memory fakes.

pub mod checkout;
pub mod discount;
pub mod instructions;
pub mod invoicing;
pub mod line_webhook;
pub mod profile;
pub mod topups;
pub mod usage;

pub use checkout::{CheckoutRequest, CheckoutResponse, CheckoutService, TopupOrderRequest};
pub use discount::DiscountService;
pub use instructions::InstructionService;
pub use line_webhook::LineWebhookService;
pub use profile::ProfileService;
pub use topups::TopupCatalogService;
pub use usage::UsageService;
