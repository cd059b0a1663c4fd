//! Prometheus metrics.
//!
//! Recording functions are safe to call before [`init_metrics`]; without an
//! installed recorder they are no-ops.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{ExporterFuture, Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;
use tokio::runtime::Handle;

/// Counter of dispatched requests.
pub const REQUESTS_TOTAL: &str = "sextant_requests_total";
/// Histogram of dispatch latency.
pub const REQUEST_DURATION_SECONDS: &str = "sextant_request_duration_seconds";
/// Gauge of requests currently in a handler.
pub const IN_FLIGHT_REQUESTS: &str = "sextant_in_flight_requests";
/// Counter of services rejected at registration.
pub const REGISTRATION_FAILURES_TOTAL: &str = "sextant_registration_failures_total";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Whether the recorder is installed.
    pub enabled: bool,

    /// Scrape listener address. `None` installs the recorder without a
    /// listener; use [`render_metrics`] to expose it yourself.
    pub addr: Option<String>,

    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: Some("0.0.0.0:9090".to_string()),
            // 1ms .. 10s
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Installs the Prometheus recorder and, when `addr` is set, starts the
/// scrape listener on it.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let mut builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let handle = match &config.addr {
        Some(addr) => {
            let addr: SocketAddr = addr
                .parse()
                .map_err(|e| TelemetryError::InvalidAddress(format!("{addr}: {e}")))?;
            start_exporter(builder.with_http_listener(addr))?
        }
        None => builder
            .install_recorder()
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?,
    };

    let _ = METRICS_HANDLE.set(handle);
    register_metric_descriptions();

    Ok(())
}

/// Binds the scrape listener and installs the recorder.
///
/// The exporter runs on the current Tokio runtime when there is one, and on
/// a dedicated single-threaded runtime otherwise.
fn start_exporter(builder: PrometheusBuilder) -> TelemetryResult<PrometheusHandle> {
    let recorder = if let Ok(runtime) = Handle::try_current() {
        let (recorder, exporter) = {
            let _guard = runtime.enter();
            builder
                .build()
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        };
        runtime.spawn(run_exporter(exporter));
        recorder
    } else {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        let (recorder, exporter) = {
            let _guard = runtime.enter();
            builder
                .build()
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        };
        thread::Builder::new()
            .name("sextant-metrics".to_string())
            .spawn(move || runtime.block_on(run_exporter(exporter)))
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        recorder
    };

    let handle = recorder.handle();
    ::metrics::set_global_recorder(recorder)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    Ok(handle)
}

async fn run_exporter(exporter: ExporterFuture) {
    if let Err(e) = exporter.await {
        tracing::error!(error = ?e, "metrics exporter stopped");
    }
}

/// Renders the current metrics in Prometheus text format, if installed.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(REQUESTS_TOTAL, "Total number of dispatched requests");
    describe_histogram!(
        REQUEST_DURATION_SECONDS,
        "Time from routing to response, in seconds"
    );
    describe_gauge!(IN_FLIGHT_REQUESTS, "Requests currently being dispatched");
    describe_counter!(
        REGISTRATION_FAILURES_TOTAL,
        "Services rejected by signature validation"
    );
}

/// Records one completed dispatch.
pub fn record_dispatch(service: &str, method: &str, status_code: u16, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "service" => service.to_string(),
        "method" => method.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(
        REQUEST_DURATION_SECONDS,
        "service" => service.to_string(),
        "method" => method.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Records a service that failed registration. `reason` should be a short,
/// low-cardinality label.
pub fn record_registration_failure(service: &str, reason: &str) {
    counter!(
        REGISTRATION_FAILURES_TOTAL,
        "service" => service.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Increments the in-flight gauge until dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Increments the gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(IN_FLIGHT_REQUESTS).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT_REQUESTS).decrement(1.0);
    }
}
