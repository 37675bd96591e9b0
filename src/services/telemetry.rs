//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Installs a stderr `fmt` subscriber. `RUST_LOG` takes precedence over
/// `default_filter`.
///
/// Returns false if a global subscriber was already installed.
pub fn init(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok()
}
