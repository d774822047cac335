// Logging setup for the binary

use tracing_subscriber::EnvFilter;

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG` (default: warn).
///
/// The daemon inherits the subscriber across fork; its output follows
/// descriptor 2 into the configured stderr target.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
