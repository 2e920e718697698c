//! # Capture Order Testing
//!
//! Test doubles for every I/O seam of the order capture pipeline.
//!
//! This crate provides:
//! - [`InMemoryOrderStore`]: `HashMap`-backed store with failure injection,
//!   artificial latency and in-flight tracking
//! - [`ScriptedConnector`] / [`ScriptedLink`]: broker whose connect and send
//!   outcomes are queued up front
//! - [`RecordingTelemetry`]: sink that keeps every record
//!
//! ## Example
//!
//! ```ignore
//! use capture_order_testing::{InMemoryOrderStore, RecordingTelemetry, ScriptedConnector};
//!
//! #[tokio::test]
//! async fn test_detach_is_recovered() {
//!     let connector = ScriptedConnector::new("orders");
//!     connector.push_send(Err(BrokerError::Detached("forced".into())));
//!
//!     let ingestion = pipeline(InMemoryOrderStore::new(), connector.clone());
//!     ingestion.ingest(NewOrder::new("a@b.c", "widget", 1.0)).await.unwrap();
//!
//!     assert_eq!(connector.connect_count(), 2);
//! }
//! ```

pub mod broker_mocks;
pub mod store_mocks;
pub mod telemetry_mocks;

pub use broker_mocks::{ScriptedConnector, ScriptedLink};
pub use store_mocks::InMemoryOrderStore;
pub use telemetry_mocks::RecordingTelemetry;

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
