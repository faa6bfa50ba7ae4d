//! Shared test helpers.

#![allow(dead_code)]

pub mod mocks;

use std::sync::Once;

static TRACING: Once = Once::new();

/// Install a test tracing subscriber once per binary; `RUST_LOG` controls
/// verbosity.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
