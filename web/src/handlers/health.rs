//! Liveness and scrape endpoints.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode};
use capture_order_runtime::MetricsExporter;

/// Liveness probe.
///
/// Does not touch the store or the broker.
///
/// # Endpoint
///
/// ```text
/// GET /healthz
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "i'm alive!")
}

/// Prometheus scrape output.
///
/// `404` when this process did not install the recorder.
///
/// # Endpoint
///
/// ```text
/// GET /metrics
/// ```
#[allow(clippy::unused_async)]
pub async fn metrics(State(state): State<AppState>) -> (StatusCode, String) {
    match state.metrics.as_deref().and_then(MetricsExporter::render) {
        Some(body) => (StatusCode::OK, body),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}
