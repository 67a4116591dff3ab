//! Tracing subscriber setup.
//!
//! Log level comes from `LOG_LEVEL` (overridable per-target through
//! `RUST_LOG`), output format from `LOG_FORMAT`. JSON output is what the
//! log shipper expects in deployed environments; plain output is for
//! local development.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Initialize the global tracing subscriber.
///
/// Must be called once, before any log line is emitted. Calling it twice
/// panics, which is acceptable because it only ever runs from `main`.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_lowercase()));

    match config.format {
        LogFormat::Json => {
            fmt()
                .with_env_filter(filter)
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .init();
        }
        LogFormat::Plain => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}
