// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

use forgefs::OsFs;
use tempfile::TempDir;

/// Initialize the tracing subscriber so test output surfaces log events.
///
/// Safe to call from every test; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// Create a store rooted in a fresh temp directory.
///
/// Returns (TempDir, OsFs) - keep the TempDir alive to prevent cleanup.
pub fn setup() -> (TempDir, OsFs) {
    init_tracing();
    let temp = TempDir::new().unwrap();
    let fs = OsFs::new(temp.path()).unwrap();
    (temp, fs)
}
