//! Log capture for engine tests.
//!
//! Resolution and rendering report skipped patterns, unknown parents and
//! unreadable files through `tracing` only. Tests that want to see why a
//! file set came out empty call [`init_test_tracing`] and run with
//! `--nocapture`, or set `RUST_LOG` for a narrower view.

use tracing_subscriber::EnvFilter;

/// Directive used when `RUST_LOG` is unset: engine crates at `debug`,
/// everything else (walkdir, globset, ignore) at `warn`.
pub const DEFAULT_TEST_FILTER: &str = "warn,ctxpack_core=debug,ctxpack_config=debug";

/// Install the shared test subscriber with [`DEFAULT_TEST_FILTER`].
///
/// Only the first call in a process installs anything.
pub fn init_test_tracing() {
    init_test_tracing_with(DEFAULT_TEST_FILTER);
}

/// Install the shared test subscriber, falling back to `directive` when
/// `RUST_LOG` is unset or unparsable. Returns whether this call installed it.
pub fn init_test_tracing_with(directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .without_time()
        .with_test_writer()
        .try_init()
        .is_ok()
}
