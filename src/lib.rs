//! eSIM storefront backend.
//!
//! Customers buy eSIM packages and top-ups through a LINE mini-app; this
//! service charges their card at the payment gateway, provisions the eSIM
//! at the wholesale provider, records the order, issues the e-invoice and
//! serves usage / top-up / installation data for SIMs already sold.

pub mod api;
pub mod cache;
pub mod chat;
pub mod config;
pub mod database;
pub mod error;
pub mod esim;
pub mod health;
pub mod invoice;
pub mod logging;
pub mod middleware;
pub mod payments;
pub mod services;
pub mod workers;
