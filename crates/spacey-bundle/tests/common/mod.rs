//! Shared helpers for integration tests

use spacey_bundle::{Registry, RuntimeConfig};
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a test-writer subscriber once per test binary (filter via RUST_LOG)
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Fresh registry with default configuration and tracing installed
pub fn registry() -> Registry {
    init_tracing();
    Registry::new(RuntimeConfig::default())
}
