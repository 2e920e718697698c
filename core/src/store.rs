//! Document store abstraction for persisted orders.
//!
//! The [`OrderStore`] trait is the seam between the ingestion pipeline and a
//! concrete document database. It is deliberately narrow: insert one order,
//! count all orders, and make sure the collection is sharded.
//!
//! # Implementations
//!
//! - `MongoOrderStore` (in `capture-order-mongodb`): MongoDB / CosmosDB Mongo API
//! - `InMemoryOrderStore` (in `capture-order-testing`): fast, deterministic tests
//!
//! # Dyn Compatibility
//!
//! Like the broker seam, methods return `Pin<Box<dyn Future>>` instead of using
//! `async fn` so the store can live behind `Arc<dyn OrderStore>`.

use crate::order::Order;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during document store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached (dial, network, server selection)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the write
    #[error("Write rejected: {0}")]
    WriteRejected(String),

    /// A read query failed
    #[error("Query failed: {0}")]
    Query(String),

    /// Collection bootstrap (sharding) failed
    #[error("Bootstrap failed: {0}")]
    Bootstrap(String),

    /// Document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Which document database the pipeline is talking to.
///
/// Resolved once at startup from the configured host and carried from then on,
/// so per-call code never re-derives the dial parameters.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StoreFlavor {
    /// Azure CosmosDB through its MongoDB wire-protocol endpoint
    CosmosDb,
    /// A plain MongoDB deployment
    MongoDb,
}

impl StoreFlavor {
    /// Host suffix that identifies a CosmosDB account.
    pub const COSMOS_HOST_MARKER: &'static str = "documents.azure.com";

    /// Resolve the flavor from a store host name.
    #[must_use]
    pub fn resolve(host: &str) -> Self {
        if host.contains(Self::COSMOS_HOST_MARKER) {
            Self::CosmosDb
        } else {
            Self::MongoDb
        }
    }

    /// Label used in logs and telemetry (`CosmosDB` / `MongoDB`).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CosmosDb => "CosmosDB",
            Self::MongoDb => "MongoDB",
        }
    }

    /// Whether connections must use TLS.
    #[must_use]
    pub const fn uses_tls(self) -> bool {
        matches!(self, Self::CosmosDb)
    }

    /// Port suffix appended to the host when dialing.
    #[must_use]
    pub const fn port_suffix(self) -> &'static str {
        match self {
            Self::CosmosDb => ":10255",
            Self::MongoDb => "",
        }
    }
}

impl fmt::Display for StoreFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Sharding request applied once when the collection is bootstrapped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardSpec {
    /// Database holding the collection
    pub database: String,
    /// Collection to shard
    pub collection: String,
    /// Field whose hash selects the partition
    pub key: String,
}

impl ShardSpec {
    /// Fully qualified namespace (`<database>.<collection>`).
    #[must_use]
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}

/// Document store abstraction for orders.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; a single store is shared by every
/// concurrent ingestion request.
pub trait OrderStore: Send + Sync {
    /// Insert one order document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the store cannot be reached and
    /// [`StoreError::WriteRejected`] if the write is refused.
    fn insert<'a>(
        &'a self,
        order: &'a Order,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    /// Count all persisted orders.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] or [`StoreError::Unavailable`] on failure.
    fn count(&self) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>>;

    /// Shard the order collection with a hashed key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Bootstrap`] if the command fails, which includes
    /// the collection already being sharded. Callers treat this as non-fatal.
    fn ensure_sharding<'a>(
        &'a self,
        spec: &'a ShardSpec,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;
}
