//! Tracing setup for test binaries

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a fmt subscriber writing through the test harness.
///
/// The filter comes from `BLOCKSTATE_LOG`, then `RUST_LOG`, and defaults to
/// `warn`. Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = std::env::var("BLOCKSTATE_LOG")
            .ok()
            .and_then(|s| s.parse::<EnvFilter>().ok())
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new("warn"));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(false)
            .try_init()
            .ok();
    });
}
