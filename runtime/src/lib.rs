//! # Capture Order Runtime
//!
//! The order ingestion pipeline, built on the seams from `capture-order-core`.
//!
//! - [`writer::DocumentStoreWriter`]: assigns identity, writes through a
//!   bounded pool, records store telemetry
//! - [`connection::ConnectionManager`]: owns the one shared broker link and its
//!   connect / reconnect cycles
//! - [`publisher::OrderPublisher`]: sends the order notification, reconnecting
//!   on detach within a three-attempt budget
//! - [`ingestion::OrderIngestion`]: persist, then publish, then report
//! - [`telemetry::TracingTelemetry`] and [`metrics::MetricsExporter`]: the
//!   production telemetry sink and its Prometheus exporter
//!
//! ## Example
//!
//! ```ignore
//! let telemetry: Arc<dyn Telemetry> = Arc::new(TracingTelemetry::new());
//! let writer = DocumentStoreWriter::new(store, Arc::clone(&telemetry), host)
//!     .with_team(team)
//!     .with_pool_limit(25);
//! let manager = Arc::new(ConnectionManager::new(connector, Arc::clone(&telemetry)));
//! let publisher = OrderPublisher::new(Some(manager), Arc::clone(&telemetry), team);
//!
//! let ingestion = OrderIngestion::new(writer, publisher, telemetry, team);
//! let order_id = ingestion.ingest(new_order).await?;
//! ```

pub mod connection;
pub mod ingestion;
pub mod metrics;
pub mod publisher;
pub mod retry;
pub mod telemetry;
pub mod writer;

pub use connection::{ConnectionManager, LinkState, SendFailure};
pub use ingestion::OrderIngestion;
pub use metrics::{MetricsError, MetricsExporter};
pub use publisher::{OrderPublisher, PublishError};
pub use retry::RetryPolicy;
pub use telemetry::TracingTelemetry;
pub use writer::{DEFAULT_POOL_LIMIT, DocumentStoreWriter};
