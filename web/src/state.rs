//! Application state for Axum handlers.

use capture_order_runtime::{MetricsExporter, OrderIngestion};
use std::sync::Arc;

/// State shared across all HTTP handlers.
///
/// Cheap to clone: both members sit behind `Arc`s.
#[derive(Clone)]
pub struct AppState {
    /// The persist-then-publish pipeline
    pub ingestion: Arc<OrderIngestion>,
    /// Prometheus exporter; `None` disables `GET /metrics`
    pub metrics: Option<Arc<MetricsExporter>>,
}

impl AppState {
    /// State for a pipeline, without metrics.
    #[must_use]
    pub fn new(ingestion: OrderIngestion) -> Self {
        Self {
            ingestion: Arc::new(ingestion),
            metrics: None,
        }
    }

    /// Expose the exporter's rendering at `GET /metrics`.
    #[must_use]
    pub fn with_metrics(mut self, exporter: Arc<MetricsExporter>) -> Self {
        self.metrics = Some(exporter);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        // Axum requires Clone state
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}
