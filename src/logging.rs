//! Diagnostics via `tracing`, written to stderr.
//!
//! The runtime itself only talks to the [`Logger`](crate::infra::Logger)
//! capability; [`TracingLogger`](crate::infra::TracingLogger) forwards that
//! to the subscriber installed here.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the level is `warn`, or `info` with
/// `verbose`.
///
/// ```bash
/// RUST_LOG=stagerun=debug stagerun run
/// ```
pub fn init(verbose: bool) {
    let fallback = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
