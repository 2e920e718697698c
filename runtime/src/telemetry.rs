//! Production telemetry sink: structured `tracing` events plus Prometheus
//! counters and histograms through the `metrics` facade.
//!
//! Without an installed recorder the metric calls are no-ops, so this sink is
//! safe to use in tests and in deployments with metrics disabled.

use capture_order_core::telemetry::{DependencyRecord, EventRecord, RequestRecord, Telemetry};
use metrics::{counter, histogram};

/// [`Telemetry`] backed by `tracing` and `metrics`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingTelemetry;

impl TracingTelemetry {
    /// Create the sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Telemetry for TracingTelemetry {
    fn record_event(&self, event: EventRecord) {
        counter!("capture_order_events_total", "name" => event.name.clone()).increment(1);
        tracing::info!(
            target: "capture_order::telemetry",
            event = %event.name,
            properties = ?event.properties,
            "Business event"
        );
    }

    fn record_dependency(&self, dependency: DependencyRecord) {
        counter!(
            "capture_order_dependency_calls_total",
            "dependency" => dependency.name.clone(),
            "success" => dependency.success.to_string()
        )
        .increment(1);
        histogram!(
            "capture_order_dependency_duration_seconds",
            "dependency" => dependency.name.clone()
        )
        .record(dependency.duration.as_secs_f64());

        tracing::debug!(
            target: "capture_order::telemetry",
            dependency = %dependency.name,
            dependency_type = %dependency.dependency_type,
            target_host = %dependency.target,
            data = %dependency.data,
            success = dependency.success,
            duration_ms = dependency.duration.as_millis(),
            result_code = dependency.result_code.as_deref().unwrap_or(""),
            "Dependency call"
        );
    }

    fn record_exception(&self, error: &(dyn std::error::Error + 'static)) {
        counter!("capture_order_exceptions_total").increment(1);
        tracing::error!(
            target: "capture_order::telemetry",
            error = %error,
            "Exception"
        );
    }

    fn record_request(&self, request: RequestRecord) {
        counter!(
            "capture_order_requests_total",
            "code" => request.response_code.clone()
        )
        .increment(1);
        histogram!("capture_order_request_duration_seconds")
            .record(request.duration.as_secs_f64());

        tracing::info!(
            target: "capture_order::telemetry",
            name = %request.name,
            method = %request.method,
            url = %request.url,
            code = %request.response_code,
            duration_ms = request.duration.as_millis(),
            "Request"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_order_core::store::StoreError;
    use std::collections::BTreeMap;
    use std::time::Duration;

    #[test]
    fn recording_without_a_recorder_is_a_no_op() {
        let telemetry = TracingTelemetry::new();
        telemetry.record_event(EventRecord::new("CaptureOrder to MongoDB").with("sequence", "1"));
        telemetry.record_dependency(DependencyRecord {
            name: "MongoDB".into(),
            dependency_type: "MongoDB".into(),
            target: "localhost".into(),
            data: "Insert order".into(),
            success: true,
            duration: Duration::from_millis(3),
            result_code: None,
        });
        telemetry.record_exception(&StoreError::Unavailable("down".into()));
        telemetry.record_request(RequestRecord {
            name: "CaptureOrder".into(),
            method: "POST".into(),
            url: "captureorder.svc/orders/v1".into(),
            duration: Duration::from_millis(5),
            response_code: "200".into(),
            properties: BTreeMap::new(),
        });
    }
}
