//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Honour `RUST_LOG`, falling back to the configured level
//!
//! # Design Decisions
//! - Uses the tracing crate for structured logging
//! - Human-readable fmt layer; fields carry the machine-readable parts

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// `level` is used when `RUST_LOG` is unset, e.g. `"info"` or
/// `"api_gateway=debug,tower_http=debug"`.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if let Err(e) = result {
        // Already installed (tests, embedding); keep the existing one.
        tracing::debug!(error = %e, "Tracing subscriber already set");
    }
}
