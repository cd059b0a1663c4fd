//! Layered configuration loading.
//!
//! Layers apply in order: defaults, then a file, then a `.env` file, then
//! `PREFIX__SECTION__KEY` environment variables. A file replaces the whole
//! configuration; keys it leaves out take their serde defaults.

use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, LogFormat, SextantConfig};

/// Builds a [`SextantConfig`] from layered sources.
///
/// # Example
///
/// ```rust,no_run
/// use sextant_config::ConfigLoader;
///
/// # fn main() -> Result<(), sextant_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("sextant.toml")?
///     .with_dotenv()?
///     .with_env_prefix("SEXTANT")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: SextantConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Starts from [`SextantConfig::default`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SextantConfig::default(),
            env_prefix: None,
        }
    }

    /// Starts from [`SextantConfig::development`].
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = SextantConfig::development();
        self
    }

    /// Starts from [`SextantConfig::production`].
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = SextantConfig::production();
        self
    }

    /// Loads a `.toml` or `.json` file. The file must exist.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        self.config = match extension.as_deref() {
            Some("toml") => toml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        Ok(self)
    }

    /// Loads a file if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Parses configuration from a string. `format` is `toml` or `json`.
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => return Err(ConfigError::UnsupportedFormat(format.to_string())),
        };
        Ok(self)
    }

    /// Loads `.env` from the current directory or its parents into the
    /// process environment. A missing file is fine.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::Dotenv(e.to_string())),
        }
    }

    /// Enables `PREFIX__SECTION__KEY` overrides, e.g.
    /// `SEXTANT__SERVER__HTTP_ADDR`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Applies environment overrides from the process and validates.
    pub fn load(self) -> Result<SextantConfig, ConfigError> {
        self.load_with_env(env::vars())
    }

    /// Like [`load`](Self::load), reading overrides from `vars` instead of
    /// the process environment.
    pub fn load_with_env<I, K, V>(mut self, vars: I) -> Result<SextantConfig, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        if let Some(prefix) = self.env_prefix.take() {
            let marker = format!("{prefix}__");
            for (key, value) in vars {
                let key = key.as_ref();
                if let Some(path) = key.strip_prefix(&marker) {
                    self.apply_env_var(key, path, value.as_ref())?;
                }
            }
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> SextantConfig {
        self.config
    }

    fn apply_env_var(&mut self, key: &str, path: &str, value: &str) -> Result<(), ConfigError> {
        let parts: Vec<&str> = path.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
            ["SERVER", "REQUEST_TIMEOUT_MS"] => {
                config.server.request_timeout_ms = parse_number(key, value)?;
            }
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                config.server.shutdown_timeout_secs = parse_number(key, value)?;
            }
            ["SERVER", "MAX_BODY_BYTES"] => {
                config.server.max_body_bytes = parse_number(key, value)?;
            }

            ["LOGGING", "ENABLED"] => config.logging.enabled = parse_flag(key, value)?,
            ["LOGGING", "LEVEL"] => config.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["LOGGING", "INCLUDE_LOCATION"] => {
                config.logging.include_location = parse_flag(key, value)?;
            }
            ["LOGGING", "INCLUDE_TARGET"] => {
                config.logging.include_target = parse_flag(key, value)?;
            }

            ["METRICS", "ENABLED"] => config.metrics.enabled = parse_flag(key, value)?,
            ["METRICS", "ADDR"] => {
                config.metrics.addr = (!value.is_empty()).then(|| value.to_string());
            }

            // keys for other consumers share the prefix
            _ => {}
        }

        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected a non-negative integer"))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::env_parse_error(key, "expected boolean")),
    }
}
