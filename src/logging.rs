//! Tracing subscriber setup for the binary

use tracing_subscriber::EnvFilter;

/// Install a stderr subscriber; `RUST_LOG` wins over `default_level`
///
/// Safe to call more than once: later calls leave the first subscriber in place.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
