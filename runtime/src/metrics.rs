//! Prometheus metrics for the capture pipeline.
//!
//! [`MetricsExporter`] installs the global `metrics` recorder and renders the
//! scrape text; the web layer serves it at `GET /metrics`. The metrics
//! themselves are emitted by [`TracingTelemetry`](crate::telemetry::TracingTelemetry):
//!
//! - `capture_order_events_total{name}`
//! - `capture_order_dependency_calls_total{dependency,success}`
//! - `capture_order_dependency_duration_seconds{dependency}`
//! - `capture_order_exceptions_total`
//! - `capture_order_requests_total{code}`
//! - `capture_order_request_duration_seconds`
//!
//! # Example
//!
//! ```rust,no_run
//! use capture_order_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//!
//! let scrape = exporter.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

/// Latency buckets (seconds) for every `*_duration_seconds` histogram.
const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0,
];

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installs the Prometheus recorder and renders its scrape output.
#[derive(Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Create an exporter; nothing is installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Install the global recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., by another test), this logs a
    /// warning and returns `Ok(())` without a handle.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                DURATION_BUCKETS,
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!(
                        "Metrics recorder already initialized, skipping re-initialization"
                    );
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this exporter did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

impl std::fmt::Debug for MetricsExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsExporter")
            .field("installed", &self.handle.is_some())
            .finish()
    }
}

fn register_metrics() {
    describe_counter!(
        "capture_order_events_total",
        "Business events recorded by the pipeline"
    );
    describe_counter!(
        "capture_order_dependency_calls_total",
        "Calls to the document store and the broker"
    );
    describe_histogram!(
        "capture_order_dependency_duration_seconds",
        "Time taken by document store and broker calls"
    );
    describe_counter!(
        "capture_order_exceptions_total",
        "Failures recorded by the pipeline, handled or not"
    );
    describe_counter!(
        "capture_order_requests_total",
        "Ingestion requests by reported response code"
    );
    describe_histogram!(
        "capture_order_request_duration_seconds",
        "Time taken by ingestion requests"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::telemetry::TracingTelemetry;
    use capture_order_core::telemetry::{EventRecord, Telemetry};

    #[test]
    fn test_exporter_creation() {
        let exporter = MetricsExporter::new();
        assert!(exporter.render().is_none());
    }

    #[test]
    fn test_exporter_renders_pipeline_metrics() {
        let mut exporter = MetricsExporter::new();
        exporter.install().unwrap();

        TracingTelemetry::new().record_event(EventRecord::new("CaptureOrder to MongoDB"));

        // handle is None if another test installed the recorder first
        if let Some(rendered) = exporter.render() {
            assert!(rendered.contains("capture_order_events_total"));
        }
    }
}
