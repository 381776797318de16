// crates/test-utils/src/lib.rs

//! Shared helpers for the `incbuild` test suites.

pub mod builders;
pub mod fixture;
pub mod recording;

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// Output goes through `with_test_writer()`, so the harness only shows it
/// for failing tests unless run with `-- --nocapture`.
///
/// Enable levels with e.g. `RUST_LOG=incbuild=debug cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}
