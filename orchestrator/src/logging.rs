//! Tracing setup for the orchestrator binary.
//!
//! Diagnostics go to stderr and are filtered by `RUST_LOG`. The run result
//! printed on stdout is product output and is unaffected by the filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `orchestrator=info,warn` if unset, so session
/// progress is visible during long unattended runs.
///
/// # Example
/// ```bash
/// RUST_LOG=orchestrator=debug orchestrator run --config orchestrator.toml
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("orchestrator=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
