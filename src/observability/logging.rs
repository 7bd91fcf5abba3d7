//! Structured logging.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to the
//! gateway, with the HTTP, TLS and Kubernetes client crates held at `warn`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Levels accepted in configuration and on the command line.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Filter directives used when `RUST_LOG` is not set.
pub fn filter_directives(level: &str) -> String {
    let level = level.to_lowercase();
    let level = if LOG_LEVELS.contains(&level.as_str()) { level.as_str() } else { "info" };

    if level == "trace" {
        // Request spans from the trace layer are emitted at debug.
        "trace,tower_http=debug,hyper=warn,h2=warn,rustls=warn,kube=warn".to_string()
    } else {
        format!("{},hyper=warn,h2=warn,rustls=warn,kube=warn", level)
    }
}

/// Install the global subscriber. Safe to call once per process.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directives(&config.log_level)));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}
