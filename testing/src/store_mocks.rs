//! In-memory order store for fast, deterministic testing.
//!
//! [`InMemoryOrderStore`] keeps orders in a `HashMap` and lets tests inject
//! failures, slow down writes, and observe how many writes were in flight at
//! once.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use capture_order_core::order::{Order, OrderId};
use capture_order_core::store::{OrderStore, ShardSpec, StoreError};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

#[derive(Debug, Default)]
struct Faults {
    inserts: VecDeque<StoreError>,
    count: Option<StoreError>,
    sharding: Option<StoreError>,
}

/// In-memory [`OrderStore`].
///
/// Cloning shares the underlying data, so a test can keep one handle for
/// assertions and hand another to the code under test.
///
/// # Example
///
/// ```
/// use capture_order_testing::InMemoryOrderStore;
/// use capture_order_core::order::{NewOrder, OrderId};
/// use capture_order_core::store::OrderStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryOrderStore::new();
/// let order = NewOrder::new("a@b.c", "widget", 1.0).open(OrderId::generate());
///
/// store.insert(&order).await?;
/// assert_eq!(store.count().await?, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    faults: Arc<Mutex<Faults>>,
    shard_requests: Arc<Mutex<Vec<ShardSpec>>>,
    delay: Arc<Mutex<Duration>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl InMemoryOrderStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every insert and count by `delay`.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = delay;
        self
    }

    /// Make the next insert fail with `error`. Calls queue up.
    pub fn fail_next_insert(&self, error: StoreError) {
        self.faults.lock().unwrap().inserts.push_back(error);
    }

    /// Make every count fail with `error` until cleared with `None`.
    pub fn fail_count(&self, error: Option<StoreError>) {
        self.faults.lock().unwrap().count = error;
    }

    /// Make sharding fail with `error` until cleared with `None`.
    pub fn fail_sharding(&self, error: Option<StoreError>) {
        self.faults.lock().unwrap().sharding = error;
    }

    /// Number of stored orders
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.read().unwrap().len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.read().unwrap().is_empty()
    }

    /// Look up a stored order
    #[must_use]
    pub fn get(&self, id: &OrderId) -> Option<Order> {
        self.orders.read().unwrap().get(id).cloned()
    }

    /// All stored orders, in no particular order
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.orders.read().unwrap().values().cloned().collect()
    }

    /// Every sharding request received so far
    #[must_use]
    pub fn shard_requests(&self) -> Vec<ShardSpec> {
        self.shard_requests.lock().unwrap().clone()
    }

    /// Highest number of concurrent store calls observed
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> InFlight {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(Arc::clone(&self.in_flight));

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        guard
    }
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl OrderStore for InMemoryOrderStore {
    fn insert<'a>(
        &'a self,
        order: &'a Order,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let _in_flight = self.enter().await;

            if let Some(error) = self.faults.lock().unwrap().inserts.pop_front() {
                return Err(error);
            }

            let mut orders = self.orders.write().unwrap();
            if orders.contains_key(order.id()) {
                return Err(StoreError::WriteRejected(format!(
                    "duplicate key: {}",
                    order.id()
                )));
            }
            orders.insert(order.id().clone(), order.clone());
            Ok(())
        })
    }

    fn count(&self) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let _in_flight = self.enter().await;

            if let Some(error) = self.faults.lock().unwrap().count.clone() {
                return Err(error);
            }
            Ok(self.len() as u64)
        })
    }

    fn ensure_sharding<'a>(
        &'a self,
        spec: &'a ShardSpec,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            self.shard_requests.lock().unwrap().push(spec.clone());
            match self.faults.lock().unwrap().sharding.clone() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        })
    }
}
