//! Top-level configuration.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use sextant_telemetry::logging::create_env_filter;

use crate::{ConfigError, LogFormat, LoggingSection, MetricsSection, ServerSection};

/// Complete Sextant configuration.
///
/// # Example
///
/// ```rust
/// use sextant_config::SextantConfig;
///
/// let config: SextantConfig = toml::from_str(r#"
///     [server]
///     http_addr = "127.0.0.1:3000"
/// "#).unwrap();
///
/// assert_eq!(config.server.http_addr, "127.0.0.1:3000");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct SextantConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Metrics settings.
    #[serde(default)]
    pub metrics: MetricsSection,
}

impl SextantConfig {
    /// Defaults tuned for local development: debug, pretty logs with
    /// locations.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.logging.include_location = true;
        config
    }

    /// Defaults for deployment: info-level JSON logs and metrics on.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config.metrics.enabled = true;
        config.metrics.addr = Some("0.0.0.0:9090".to_string());
        config
    }

    /// Checks values the types cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.http_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_body_bytes",
                "must be greater than zero",
            ));
        }

        if create_env_filter(&self.logging.level).is_err() {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!("invalid filter directive: {}", self.logging.level),
            ));
        }

        if self.metrics.enabled {
            if let Some(addr) = &self.metrics.addr {
                if addr.parse::<SocketAddr>().is_err() {
                    return Err(ConfigError::invalid_value(
                        "metrics.addr",
                        format!("invalid socket address: {addr}"),
                    ));
                }
            }

            let buckets = &self.metrics.duration_buckets;
            if buckets.is_empty() || buckets.windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(ConfigError::invalid_value(
                    "metrics.duration_buckets",
                    "must be non-empty and strictly increasing",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SextantConfig::default();
        assert_eq!(config.server.http_addr, "0.0.0.0:8080");
        assert!(!config.metrics.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let dev = SextantConfig::development();
        assert_eq!(dev.logging.format, LogFormat::Pretty);
        assert!(dev.validate().is_ok());

        let prod = SextantConfig::production();
        assert!(prod.metrics.enabled);
        assert!(prod.validate().is_ok());
    }

    #[test]
    fn test_invalid_http_addr() {
        let mut config = SextantConfig::default();
        config.server.http_addr = "localhost".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "server.http_addr"
        ));
    }

    #[test]
    fn test_zero_body_limit() {
        let mut config = SextantConfig::default();
        config.server.max_body_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unsorted_buckets() {
        let mut config = SextantConfig::production();
        config.metrics.duration_buckets = vec![1.0, 0.5];
        assert!(config.validate().is_err());

        // ignored while metrics are off
        config.metrics.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_round_trip_shape() {
        let json = r#"{"logging": {"format": "pretty", "level": "warn"}}"#;
        let config: SextantConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.server, ServerSection::default());
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result: Result<SextantConfig, _> = toml::from_str("[tracing]\nenabled = true");
        assert!(result.is_err());
    }
}
