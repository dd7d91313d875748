use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. Honors `RUST_LOG`, defaulting to `info`.
/// Logs go to stderr so they interleave with the progress bars.
pub fn init_tracing(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();

    if result.is_err() {
        tracing::warn!("Tracing subscriber already set; skipping re-initialization");
        return;
    }
    tracing::debug!("Tracing initialized for {}", service_name);
}
