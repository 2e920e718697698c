//! Axum HTTP surface for the order capture pipeline.
//!
//! A thin shell over [`OrderIngestion`](capture_order_runtime::OrderIngestion):
//! handlers parse JSON, call the pipeline and map its result to a response.
//!
//! ```text
//! POST /v1/order ──► create_order ──► OrderIngestion::ingest ──► 200 {"orderId"}
//!                                                            └─► 500 {"error"}
//! GET  /v1/order ──► order_count  ──► OrderIngestion::count_orders
//! GET  /healthz  ──► health_check
//! GET  /metrics  ──► MetricsExporter::render
//! ```
//!
//! # Example
//!
//! ```ignore
//! use capture_order_web::{AppState, router};
//!
//! let app = router(AppState::new(ingestion));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::AppError;
pub use router::{cors_layer, router};
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
