//! Tracing setup for harness binaries and tests.

use crate::harness::HarnessConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Install a global subscriber: `RUST_LOG` if set, otherwise the harness
/// log filter, written through the fmt layer.
///
/// Returns `false` if a subscriber was already installed, which makes it
/// safe to call from every test.
pub fn init_tracing(config: &HarnessConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .try_init()
        .is_ok()
}
