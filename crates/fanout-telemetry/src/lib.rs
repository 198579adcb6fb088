//! # Fanout Telemetry
//!
//! Structured logging for the fan-out broadcaster.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fanout_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(&config).expect("Failed to init telemetry");
//!     // Spans and events from fanout-core are now written to stdout
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `fanout` | Service name in log records |
//! | `FANOUT_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `FANOUT_JSON_LOGS` | `false` (`true` in containers) | JSON output |

#![warn(missing_docs)]

mod config;

pub use config::{TelemetryConfig, DEFAULT_SERVICE_NAME};

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The log level directive did not parse.
    #[error("Invalid log filter {directive:?}: {reason}")]
    Filter {
        /// Rejected directive
        directive: String,
        /// Parser message
        reason: String,
    },

    /// A global subscriber is already installed.
    #[error("Failed to install subscriber: {0}")]
    Install(String),
}

/// Build the filter: `RUST_LOG` syntax from the config.
pub fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.log_level).map_err(|e| TelemetryError::Filter {
        directive: config.log_level.clone(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber.
///
/// Returns a guard to hold for the lifetime of the application; it logs the
/// shutdown when dropped.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let filter = env_filter(config)?;

    let installed = if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);
        tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .try_init()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
    };
    installed.map_err(|e| TelemetryError::Install(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        log_level = %config.log_level,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        service_name: config.service_name.clone(),
    })
}

/// Guard that keeps telemetry active.
#[derive(Debug)]
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_rejects_garbage() {
        let config = TelemetryConfig {
            log_level: "fanout_core=loud".to_string(),
            ..TelemetryConfig::default()
        };
        assert!(matches!(
            env_filter(&config),
            Err(TelemetryError::Filter { .. })
        ));
    }

    #[test]
    fn test_env_filter_accepts_directives() {
        let config = TelemetryConfig {
            log_level: "warn,fanout_core=debug".to_string(),
            ..TelemetryConfig::default()
        };
        assert!(env_filter(&config).is_ok());
    }

    #[test]
    fn test_second_init_fails() {
        let config = TelemetryConfig::default();
        let _first = init_telemetry(&config).unwrap();
        let second = init_telemetry(&config);
        assert!(matches!(second, Err(TelemetryError::Install(_))));
    }
}
