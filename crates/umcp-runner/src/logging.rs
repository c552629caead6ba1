//! Tracing subscriber setup.
//!
//! - WARN: overflow, give-ups, port failures
//! - INFO: link established or restarted, bridge start and periodic stats
//! - DEBUG: state changes, retransmissions, payload checksum failures
//! - TRACE: every frame sent and received

use tracing_subscriber::EnvFilter;

/// Initialize logging. `RUST_LOG` overrides the default level.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize logging for tests. Safe to call more than once.
pub fn init_for_tests() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
