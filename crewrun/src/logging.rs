//! Diagnostic tracing for the engine.
//!
//! Tracing goes to stderr and is never persisted. Run logs (`io/run_log`) are
//! the durable record of a run and do not depend on the filter chosen here.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter for a `-v` count: 0 → `warn`, 1 → `info`, 2+ → `debug`.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "crewrun=info,warn",
        _ => "crewrun=debug,info",
    }
}

/// Install a compact stderr subscriber.
///
/// `RUST_LOG`, when set, wins over the verbosity flag.
///
/// # Example
/// ```bash
/// RUST_LOG=crewrun::scheduler=debug crewrun run
/// ```
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact().with_target(verbosity > 1))
        .init();
}
