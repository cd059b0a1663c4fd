//! Observability for Sextant services.
//!
//! - **Logging**: structured JSON (or pretty) output through `tracing-subscriber`
//! - **Metrics**: Prometheus exposition through the `metrics` crate
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `sextant_requests_total` | Counter | `service`, `method`, `status` |
//! | `sextant_request_duration_seconds` | Histogram | `service`, `method` |
//! | `sextant_in_flight_requests` | Gauge | - |
//! | `sextant_registration_failures_total` | Counter | `service`, `reason` |
//!
//! # Example
//!
//! ```rust,no_run
//! use sextant_telemetry::{init_logging, init_metrics, LogConfig, MetricsConfig};
//!
//! # fn main() -> Result<(), sextant_telemetry::TelemetryError> {
//! init_logging(&LogConfig::development())?;
//! init_metrics(&MetricsConfig::default())?;
//!
//! tracing::info!(service = "jobs", "ready");
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/sextant-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{init_metrics, render_metrics, InFlightGuard, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
