//! Logging setup shared by both binaries

use tracing_subscriber::EnvFilter;

/// Initialize stdout logging.
///
/// Uses the level from the RUST_LOG environment variable and falls back to
/// "info" when it is not set.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // A second init (e.g. from tests) leaves the first subscriber in place
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}
