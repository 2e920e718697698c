//! Order ingestion orchestrator.
//!
//! One call to [`OrderIngestion::ingest`] persists an order and then forwards
//! it to the broker. The two writes are independent: a persisted order whose
//! publish failed is still reported to the caller as captured.

use crate::publisher::OrderPublisher;
use crate::writer::DocumentStoreWriter;
use capture_order_core::order::{NewOrder, OrderId};
use capture_order_core::store::StoreError;
use capture_order_core::telemetry::{RequestRecord, SERVICE_NAME, Telemetry};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Logical route reported in request telemetry.
pub const REQUEST_URL: &str = "captureorder.svc/orders/v1";

/// Persist-then-publish pipeline.
#[derive(Clone)]
pub struct OrderIngestion {
    writer: DocumentStoreWriter,
    publisher: OrderPublisher,
    telemetry: Arc<dyn Telemetry>,
    team: String,
}

impl OrderIngestion {
    /// Assemble the pipeline.
    #[must_use]
    pub fn new(
        writer: DocumentStoreWriter,
        publisher: OrderPublisher,
        telemetry: Arc<dyn Telemetry>,
        team: impl Into<String>,
    ) -> Self {
        Self {
            writer,
            publisher,
            telemetry,
            team: team.into(),
        }
    }

    /// The store writer.
    #[must_use]
    pub const fn writer(&self) -> &DocumentStoreWriter {
        &self.writer
    }

    /// The broker publisher.
    #[must_use]
    pub const fn publisher(&self) -> &OrderPublisher {
        &self.publisher
    }

    /// Capture one order.
    ///
    /// Returns the persisted order's id whether or not the publish succeeded.
    /// The pipeline runs on its own task, so dropping the returned future
    /// (a client hanging up) never leaves a persisted order unpublished.
    ///
    /// # Errors
    ///
    /// Returns the store error when persistence fails; nothing is published
    /// in that case.
    pub async fn ingest(&self, new_order: NewOrder) -> Result<OrderId, StoreError> {
        let pipeline = self.clone();
        match tokio::spawn(async move { pipeline.run(new_order).await }).await {
            Ok(result) => result,
            Err(error) => match error.try_into_panic() {
                Ok(payload) => std::panic::resume_unwind(payload),
                Err(error) => Err(StoreError::Unavailable(error.to_string())),
            },
        }
    }

    async fn run(&self, new_order: NewOrder) -> Result<OrderId, StoreError> {
        let started = Instant::now();

        let order = match self.writer.persist(new_order).await {
            Ok(order) => order,
            Err(error) => {
                self.record_request(started, false);
                return Err(error);
            }
        };

        let published = self.publisher.publish(&order).await;
        if !published {
            tracing::warn!(
                order_id = %order.id(),
                "Order persisted but not forwarded to the broker"
            );
        }
        self.record_request(started, published);

        Ok(order.id().clone())
    }

    fn record_request(&self, started: Instant, success: bool) {
        let mut properties = BTreeMap::new();
        properties.insert("team".to_string(), self.team.clone());
        properties.insert("service".to_string(), SERVICE_NAME.to_string());

        self.telemetry.record_request(RequestRecord {
            name: SERVICE_NAME.to_string(),
            method: "POST".to_string(),
            url: REQUEST_URL.to_string(),
            duration: started.elapsed(),
            response_code: if success { "200" } else { "500" }.to_string(),
            properties,
        });
    }

    /// Count persisted orders.
    ///
    /// # Errors
    ///
    /// Returns the store error when the count fails.
    pub async fn count_orders(&self) -> Result<u64, StoreError> {
        self.writer.count().await
    }
}

impl std::fmt::Debug for OrderIngestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderIngestion")
            .field("writer", &self.writer)
            .field("publisher", &self.publisher)
            .field("team", &self.team)
            .finish_non_exhaustive()
    }
}
