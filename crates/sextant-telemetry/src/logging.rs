//! Structured logging.
//!
//! Installs a `tracing-subscriber` registry with an [`EnvFilter`] and either
//! a JSON formatter (production) or a pretty one (development).
//!
//! # Example
//!
//! ```rust,no_run
//! use sextant_telemetry::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::default()).unwrap();
//! tracing::info!(service = "jobs", method = "list", "dispatching");
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether logging is installed at all.
    pub enabled: bool,

    /// Filter directive, e.g. `info` or `sextant_core=debug,info`.
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    pub json_format: bool,

    /// Include source file and line number.
    pub file_line_info: bool,

    /// Include the event target (module path).
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Verbose, human-readable output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            json_format: false,
            file_line_info: true,
            include_target: true,
        }
    }

    /// JSON output at `info`.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            file_line_info: false,
            include_target: true,
        }
    }
}

/// Installs the global subscriber.
///
/// Returns an error if the filter directive is invalid or a global
/// subscriber is already set. Does nothing when `enabled` is false.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    Ok(())
}

/// Parses a filter directive.
pub fn create_env_filter(directive: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(directive)
        .map_err(|e| TelemetryError::LoggingInit(format!("Invalid log level {directive:?}: {e}")))
}

/// Field names shared by log statements across the workspace.
pub mod fields {
    /// Request correlation id.
    pub const REQUEST_ID: &str = "request_id";
    /// Service name.
    pub const SERVICE: &str = "service";
    /// Method name.
    pub const METHOD: &str = "method";
    /// HTTP method.
    pub const HTTP_METHOD: &str = "http.method";
    /// Request path.
    pub const HTTP_PATH: &str = "http.path";
    /// Response status.
    pub const HTTP_STATUS: &str = "http.status_code";
    /// Elapsed time in milliseconds.
    pub const DURATION_MS: &str = "duration_ms";
    /// Error message.
    pub const ERROR: &str = "error";
}
