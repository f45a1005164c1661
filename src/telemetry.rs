//! Logging and telemetry initialization.
//!
//! The subscriber is constructed explicitly at process start and handed back
//! to the caller as a [`TelemetryGuard`]; components never reach for a
//! module-level logging singleton. Dropping the guard is a no-op today, but
//! callers should keep it alive for the lifetime of the process so future
//! buffered writers can flush on shutdown.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Handle proving telemetry was initialized; thread it through constructors
/// that need to assert logging is live.
#[derive(Debug)]
pub struct TelemetryGuard {
    _private: (),
}

/// Initialize the tracing subscriber once at application startup.
///
/// `RUST_LOG` overrides the configured level filter. Calling this twice
/// returns an error from the underlying registry.
pub fn init_telemetry(config: &ObservabilityConfig) -> anyhow::Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    if config.json_logging {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(true))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init()?;
    }

    tracing::info!(
        log_level = %config.log_level,
        json = config.json_logging,
        "telemetry initialized"
    );

    Ok(TelemetryGuard { _private: () })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ObservabilityConfig;

    #[test]
    fn test_global_registry_is_set_at_most_once() {
        let config = ObservabilityConfig::default();
        let first = init_telemetry(&config);
        let second = init_telemetry(&config);
        // Another test in this binary may have claimed the registry already,
        // so neither call is guaranteed to win; both winning is impossible.
        assert!(!(first.is_ok() && second.is_ok()));
    }
}
