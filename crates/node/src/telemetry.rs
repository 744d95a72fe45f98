//! Logging initialization.

use tracing_subscriber::EnvFilter;

/// Initialize console logging with an env-filter.
///
/// Honors `RUST_LOG`; defaults to `info` globally with debug output for the
/// tessera crates. Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tessera=debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
