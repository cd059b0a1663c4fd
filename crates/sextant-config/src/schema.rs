//! Configuration sections.
//!
//! Every field has a serde default, so a file only needs the keys it
//! changes. Unknown keys are rejected.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sextant_server::{
    ServerConfig, DEFAULT_HTTP_ADDR, DEFAULT_MAX_BODY_BYTES, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
};
use sextant_telemetry::{LogConfig, MetricsConfig};

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Listen address.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Body collection and handler timeout, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Grace period for open connections at shutdown, in seconds.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// Largest accepted request body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            request_timeout_ms: default_request_timeout_ms(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerSection {
    /// Converts to the server's runtime configuration.
    #[must_use]
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig::builder()
            .http_addr(self.http_addr.clone())
            .request_timeout(Duration::from_millis(self.request_timeout_ms))
            .shutdown_timeout(Duration::from_secs(self.shutdown_timeout_secs))
            .max_body_bytes(self.max_body_bytes)
            .build()
    }
}

fn default_http_addr() -> String {
    DEFAULT_HTTP_ADDR.to_string()
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS * 1000
}

fn default_shutdown_timeout_secs() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_SECS
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line, human-readable.
    Pretty,
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Whether to install a subscriber.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include file and line.
    #[serde(default)]
    pub include_location: bool,

    /// Include the event target.
    #[serde(default = "default_true")]
    pub include_target: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            include_location: false,
            include_target: true,
        }
    }
}

impl LoggingSection {
    /// Converts to the telemetry crate's logging configuration.
    #[must_use]
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            enabled: self.enabled,
            level: self.level.clone(),
            json_format: self.format == LogFormat::Json,
            file_line_info: self.include_location,
            include_target: self.include_target,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[metrics]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Whether to install the Prometheus recorder.
    #[serde(default)]
    pub enabled: bool,

    /// Scrape listener address. Absent means no listener.
    #[serde(default)]
    pub addr: Option<String>,

    /// Request duration buckets, in seconds.
    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: None,
            duration_buckets: default_duration_buckets(),
        }
    }
}

impl MetricsSection {
    /// Converts to the telemetry crate's metrics configuration.
    #[must_use]
    pub fn to_metrics_config(&self) -> MetricsConfig {
        MetricsConfig {
            enabled: self.enabled,
            addr: self.addr.clone(),
            duration_buckets: self.duration_buckets.clone(),
        }
    }
}

fn default_duration_buckets() -> Vec<f64> {
    MetricsConfig::default().duration_buckets
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_section_conversion() {
        let section = ServerSection {
            http_addr: "127.0.0.1:9000".to_string(),
            request_timeout_ms: 1500,
            shutdown_timeout_secs: 5,
            max_body_bytes: 4096,
        };
        let config = section.to_server_config();

        assert_eq!(config.http_addr(), "127.0.0.1:9000");
        assert_eq!(config.request_timeout(), Duration::from_millis(1500));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_body_bytes(), 4096);
    }

    #[test]
    fn test_server_section_defaults_match_server() {
        assert_eq!(
            ServerSection::default().to_server_config(),
            ServerConfig::default()
        );
    }

    #[test]
    fn test_logging_section_conversion() {
        let section = LoggingSection {
            format: LogFormat::Pretty,
            include_location: true,
            ..LoggingSection::default()
        };
        let config = section.to_log_config();

        assert!(!config.json_format);
        assert!(config.file_line_info);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let section: ServerSection = toml::from_str("max_body_bytes = 10").unwrap();
        assert_eq!(section.max_body_bytes, 10);
        assert_eq!(section.http_addr, DEFAULT_HTTP_ADDR);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<LoggingSection, _> = toml::from_str("colour = true");
        assert!(result.is_err());
    }
}
