//! Tracing initialization for binaries and tests.
//!
//! Routes `log` macros into `tracing` and installs an env-filtered
//! fmt subscriber. Safe to call more than once.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber, honouring `RUST_LOG` and falling
/// back to the given filter (e.g. `"artflow=info"`).
pub fn init_tracing(default_filter: &str) {
    // Errors mean a subscriber/logger is already installed; fine for
    // repeated calls from tests.
    let _ = tracing_log::LogTracer::init();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer());
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_reentrant() {
        init_tracing("artflow=debug");
        init_tracing("artflow=info");
        tracing::info!("subscriber installed");
    }
}
