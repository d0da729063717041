//! Process-wide tracing setup for the binary.

use std::sync::OnceLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter, below `RUST_LOG`.
pub const LOG_ENV: &str = "CLAUDE_SETUP_LOG";

static INIT: OnceLock<()> = OnceLock::new();

/// Pick the filter directive: `RUST_LOG`, then `CLAUDE_SETUP_LOG`, then the
/// configured level. `verbose` forces `debug` unless `RUST_LOG` is set.
pub fn filter_directive(configured: &str, verbose: bool) -> String {
    if let Ok(directive) = std::env::var(EnvFilter::DEFAULT_ENV) {
        if !directive.trim().is_empty() {
            return directive;
        }
    }
    if verbose {
        return "debug".to_string();
    }
    match std::env::var(LOG_ENV) {
        Ok(directive) if !directive.trim().is_empty() => directive,
        _ => configured.to_string(),
    }
}

/// Install the stderr subscriber. Later calls are no-ops.
pub fn init(configured: &str, verbose: bool) {
    if INIT.get().is_some() {
        return;
    }

    let directive = filter_directive(configured, verbose);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
    let _ = INIT.set(());
}
