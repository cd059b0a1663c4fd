//! # Sextant Config
//!
//! Typed, layered configuration for Sextant services.
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! request_timeout_ms = 30000
//! max_body_bytes = 2097152
//!
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//! ```
//!
//! Any key can be overridden from the environment as
//! `SEXTANT__SECTION__KEY`, e.g. `SEXTANT__LOGGING__LEVEL=debug`.

#![doc(html_root_url = "https://docs.rs/sextant-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::SextantConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{LogFormat, LoggingSection, MetricsSection, ServerSection};
