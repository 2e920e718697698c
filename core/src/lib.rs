//! # Capture Order Core
//!
//! Domain types and I/O seams for the order capture pipeline.
//!
//! The pipeline accepts an order, persists it to a document store, then
//! forwards a small notification to a message broker. This crate holds the
//! pieces every other crate agrees on:
//!
//! - **Orders**: [`order::NewOrder`] as submitted, [`order::Order`] once the
//!   writer has assigned its identity
//! - **Store seam**: [`store::OrderStore`], implemented against MongoDB /
//!   CosmosDB and in memory for tests
//! - **Broker seam**: [`broker::BrokerConnector`] and [`broker::BrokerLink`],
//!   implemented over AMQP 1.0 and scripted for tests
//! - **Telemetry seam**: [`telemetry::Telemetry`], the injected sink for
//!   events, dependency calls, exceptions and requests
//! - **SAS signing**: [`sas::SasSigner`] for Service Bus / Event Hubs tokens
//!
//! ## Architecture
//!
//! ```text
//! HTTP ──► OrderIngestion ──► DocumentStoreWriter ──► OrderStore
//!                  │
//!                  └────────► OrderPublisher ──► ConnectionManager ──► BrokerConnector
//! ```
//!
//! Everything that performs I/O sits behind a trait object so the runtime can be
//! exercised end to end without a database or a broker.

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod broker;
pub mod order;
pub mod sas;
pub mod store;
pub mod telemetry;

pub use broker::{BrokerConnector, BrokerError, BrokerLink, OrderMessage};
pub use order::{NewOrder, Order, OrderId, OrderStatus};
pub use store::{OrderStore, ShardSpec, StoreError, StoreFlavor};
pub use telemetry::{
    DependencyRecord, EventRecord, NoopTelemetry, RequestRecord, SERVICE_NAME, Telemetry,
};
