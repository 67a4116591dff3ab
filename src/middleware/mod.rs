//! HTTP middleware: error envelopes and request logging

pub mod error;
pub mod logging;
