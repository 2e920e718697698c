//! Document store writer.
//!
//! The writer is where an order gains its identity: [`DocumentStoreWriter::persist`]
//! turns a caller's [`NewOrder`] into an [`Order`] with a fresh id and status
//! `Open`, then writes it. Every store call holds one permit of a bounded pool
//! for its duration, which is the pipeline's only backpressure.

use capture_order_core::order::{NewOrder, Order, OrderId};
use capture_order_core::store::{OrderStore, ShardSpec, StoreError, StoreFlavor};
use capture_order_core::telemetry::{DependencyRecord, EventRecord, SERVICE_NAME, Telemetry};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, SemaphorePermit};

/// Default number of concurrent store calls.
pub const DEFAULT_POOL_LIMIT: usize = 25;

/// Persists orders and answers order counts.
#[derive(Clone)]
pub struct DocumentStoreWriter {
    store: Arc<dyn OrderStore>,
    telemetry: Arc<dyn Telemetry>,
    flavor: StoreFlavor,
    host: String,
    team: String,
    permits: Arc<Semaphore>,
    pool_limit: usize,
}

impl DocumentStoreWriter {
    /// Create a writer for the store reachable at `host`.
    ///
    /// The store flavor is resolved from the host once, here.
    #[must_use]
    pub fn new(
        store: Arc<dyn OrderStore>,
        telemetry: Arc<dyn Telemetry>,
        host: impl Into<String>,
    ) -> Self {
        let host = host.into();
        Self {
            store,
            telemetry,
            flavor: StoreFlavor::resolve(&host),
            host,
            team: String::new(),
            permits: Arc::new(Semaphore::new(DEFAULT_POOL_LIMIT)),
            pool_limit: DEFAULT_POOL_LIMIT,
        }
    }

    /// Team tag attached to business events.
    #[must_use]
    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = team.into();
        self
    }

    /// Bound the number of concurrent store calls (at least 1).
    #[must_use]
    pub fn with_pool_limit(mut self, limit: usize) -> Self {
        let limit = limit.max(1);
        self.permits = Arc::new(Semaphore::new(limit));
        self.pool_limit = limit;
        self
    }

    /// Store flavor resolved from the host.
    #[must_use]
    pub const fn flavor(&self) -> StoreFlavor {
        self.flavor
    }

    /// Configured pool limit.
    #[must_use]
    pub const fn pool_limit(&self) -> usize {
        self.pool_limit
    }

    /// Permits not currently held by a store call.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Assign an identity to `new_order` and write it.
    ///
    /// # Errors
    ///
    /// Returns the store's error unchanged. Nothing is retried here.
    pub async fn persist(&self, new_order: NewOrder) -> Result<Order, StoreError> {
        let order = new_order.open(OrderId::generate());

        let permit = self.acquire().await?;
        let started = Instant::now();
        let result = self.store.insert(&order).await;
        let duration = started.elapsed();
        drop(permit);

        self.record_dependency("Insert order", duration, result.as_ref().err());

        match result {
            Ok(()) => {
                self.telemetry.record_event(
                    EventRecord::new(format!("CaptureOrder to {}", self.flavor))
                        .with("team", self.team.as_str())
                        .with("sequence", "1")
                        .with("type", self.flavor.label())
                        .with("service", SERVICE_NAME)
                        .with("orderId", order.id().as_str()),
                );
                tracing::info!(
                    order_id = %order.id(),
                    store = %self.flavor,
                    duration_ms = duration.as_millis(),
                    "Inserted order"
                );
                Ok(order)
            }
            Err(error) => {
                self.telemetry.record_exception(&error);
                tracing::error!(
                    store = %self.flavor,
                    host = %self.host,
                    error = %error,
                    "Failed to insert order"
                );
                Err(error)
            }
        }
    }

    /// Count all persisted orders.
    ///
    /// # Errors
    ///
    /// Returns the store's error unchanged.
    pub async fn count(&self) -> Result<u64, StoreError> {
        let permit = self.acquire().await?;
        let started = Instant::now();
        let result = self.store.count().await;
        let duration = started.elapsed();
        drop(permit);

        self.record_dependency("Count orders", duration, result.as_ref().err());

        match result {
            Ok(count) => {
                self.telemetry.record_event(
                    EventRecord::new(format!("Order Count on {}", self.flavor))
                        .with("team", self.team.as_str())
                        .with("sequence", "z")
                        .with("type", self.flavor.label())
                        .with("service", SERVICE_NAME)
                        .with("count", count.to_string()),
                );
                tracing::debug!(count, store = %self.flavor, "Counted orders");
                Ok(count)
            }
            Err(error) => {
                self.telemetry.record_exception(&error);
                tracing::error!(store = %self.flavor, error = %error, "Failed to count orders");
                Err(error)
            }
        }
    }

    /// Shard the order collection. Failures are logged and otherwise ignored,
    /// since "already sharded" is reported as an error by the store.
    pub async fn bootstrap(&self, spec: &ShardSpec) {
        tracing::info!(
            namespace = %spec.namespace(),
            shard_key = %spec.key,
            "Sharding order collection"
        );
        match self.store.ensure_sharding(spec).await {
            Ok(()) => tracing::info!(namespace = %spec.namespace(), "Collection sharded"),
            Err(error) => {
                self.telemetry.record_exception(&error);
                tracing::warn!(
                    namespace = %spec.namespace(),
                    error = %error,
                    "Could not shard collection, continuing"
                );
            }
        }
    }

    async fn acquire(&self) -> Result<SemaphorePermit<'_>, StoreError> {
        self.permits
            .acquire()
            .await
            .map_err(|_| StoreError::Unavailable("writer pool closed".to_string()))
    }

    fn record_dependency(&self, data: &str, duration: Duration, error: Option<&StoreError>) {
        self.telemetry.record_dependency(DependencyRecord {
            name: self.flavor.label().to_string(),
            dependency_type: "MongoDB".to_string(),
            target: self.host.clone(),
            data: data.to_string(),
            success: error.is_none(),
            duration,
            result_code: error.map(ToString::to_string),
        });
    }
}

impl std::fmt::Debug for DocumentStoreWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStoreWriter")
            .field("flavor", &self.flavor)
            .field("host", &self.host)
            .field("team", &self.team)
            .field("pool_limit", &self.pool_limit)
            .finish_non_exhaustive()
    }
}
