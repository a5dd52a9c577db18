//! Telemetry and observability setup
//!
//! Configures structured logging with tracing and tracing-subscriber.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Default filter directives for a given level
///
/// Relay evaluation logs live under `turnselect::relay`; HTTP access logs
/// come from `tower_http`.
pub fn default_directives(default_level: &str) -> String {
    format!("turnselect={},tower_http=info", default_level)
}

/// Initialize tracing subscriber for structured logging
///
/// Only the first call per process has an effect. `RUST_LOG` takes precedence
/// over `default_level` (normally `observability.log_level` from config).
///
/// # Examples
///
/// ```no_run
/// turnselect::telemetry::init("info");
/// tracing::info!("Application started");
/// ```
pub fn init(default_level: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directives(default_level)));

        // A subscriber installed by an embedding application wins
        if let Err(e) = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
        {
            eprintln!("turnselect: tracing subscriber already set: {}", e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(
            default_directives("debug"),
            "turnselect=debug,tower_http=info"
        );
    }

    #[test]
    fn test_init_is_idempotent() {
        init("debug");
        init("info");
        tracing::debug!("telemetry initialized twice without panicking");
    }
}
