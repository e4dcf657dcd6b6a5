//! Telemetry and observability setup
//!
//! Configures structured logging with tracing and tracing-subscriber.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Build the default filter directive for a log level
///
/// HTTP client internals stay at `warn` unless RUST_LOG says otherwise.
pub fn default_directive(default_level: &str) -> String {
    format!("metricmatch={},reqwest=warn,hyper=warn", default_level)
}

/// Initialize tracing subscriber for structured logging
///
/// This can only be called once per process. Subsequent calls are silently ignored.
///
/// Reads log level from RUST_LOG environment variable, defaulting to the
/// level specified in config (or "info" if not set). Logs go to stderr so
/// reports on stdout stay machine-readable.
///
/// # Examples
///
/// ```no_run
/// metricmatch::telemetry::init("info");
/// tracing::info!("Application started");
/// ```
pub fn init(default_level: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(default_level)));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_scopes_level_to_crate() {
        assert_eq!(
            default_directive("debug"),
            "metricmatch=debug,reqwest=warn,hyper=warn"
        );
    }

    #[test]
    fn test_default_directive_parses_as_filter() {
        assert!(EnvFilter::try_new(default_directive("info")).is_ok());
    }
}
