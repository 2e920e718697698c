//! MongoDB order store for the order capture pipeline.
//!
//! Implements [`OrderStore`](capture_order_core::store::OrderStore) on the
//! official `mongodb` driver. The same code talks to a plain MongoDB
//! deployment and to Azure CosmosDB's MongoDB API; the difference is resolved
//! once from the host name (see [`StoreFlavor`](capture_order_core::store::StoreFlavor)):
//!
//! | Host contains `documents.azure.com` | TLS | Port     | Label      |
//! |-------------------------------------|-----|----------|------------|
//! | yes                                 | on  | `:10255` | `CosmosDB` |
//! | no                                  | off | default  | `MongoDB`  |
//!
//! The driver's connection pool is capped at the configured pool limit, the
//! same bound the writer enforces with its semaphore.
//!
//! # Example
//!
//! ```ignore
//! use capture_order_mongodb::{MongoConfig, MongoOrderStore};
//!
//! async fn example(config: MongoConfig) -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoOrderStore::connect(&config, &NoopTelemetry).await?;
//!     store.ensure_sharding(&config.shard_spec()).await.ok();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod document;
pub mod store;

pub use config::{DIAL_TIMEOUT, MongoConfig};
pub use document::OrderDocument;
pub use store::MongoOrderStore;
