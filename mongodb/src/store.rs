//! [`OrderStore`] over the official MongoDB driver.

use crate::config::{DIAL_TIMEOUT, MongoConfig};
use crate::document::OrderDocument;
use capture_order_core::order::Order;
use capture_order_core::store::{OrderStore, ShardSpec, StoreError, StoreFlavor};
use capture_order_core::telemetry::{DependencyRecord, Telemetry};
use mongodb::bson::{Document, doc};
use mongodb::error::{Error as MongoError, ErrorKind};
use mongodb::options::{ClientOptions, Credential, Tls, TlsOptions};
use mongodb::{Client, Collection, Database};
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

const APP_NAME: &str = "captureorder";

/// MongoDB / CosmosDB order store.
///
/// Cheap to clone: the driver's `Client` is a handle to a shared pool.
#[derive(Clone, Debug)]
pub struct MongoOrderStore {
    client: Client,
    database: Database,
    orders: Collection<OrderDocument>,
    flavor: StoreFlavor,
}

impl MongoOrderStore {
    /// Dial the store and verify it answers a `ping`.
    ///
    /// Records one `Create session` dependency and, on failure, one exception.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the store cannot be reached or
    /// rejects the credentials.
    pub async fn connect(config: &MongoConfig, telemetry: &dyn Telemetry) -> Result<Self, StoreError> {
        let flavor = config.flavor();
        tracing::info!(
            store = %flavor,
            host = %config.host,
            port = %flavor.port_suffix(),
            database = %config.database,
            username = %config.username,
            tls = flavor.uses_tls(),
            pool_limit = config.pool_limit,
            "Attempting to connect to order store"
        );

        let started = Instant::now();
        let result = Self::dial(config).await;
        let duration = started.elapsed();

        telemetry.record_dependency(DependencyRecord {
            name: flavor.label().to_string(),
            dependency_type: "MongoDB".to_string(),
            target: config.host.clone(),
            data: "Create session".to_string(),
            success: result.is_ok(),
            duration,
            result_code: result.as_ref().err().map(ToString::to_string),
        });

        match &result {
            Ok(_) => tracing::info!(store = %flavor, "Connected to order store"),
            Err(error) => {
                telemetry.record_exception(error);
                tracing::error!(
                    store = %flavor,
                    address = %config.address(),
                    error = %error,
                    "Can't connect to order store"
                );
            }
        }
        result
    }

    async fn dial(config: &MongoConfig) -> Result<Self, StoreError> {
        let flavor = config.flavor();

        let mut options = ClientOptions::parse(config.connection_uri())
            .await
            .map_err(|e| classify(&e, StoreError::Unavailable))?;
        options.app_name = Some(APP_NAME.to_string());
        options.max_pool_size = Some(config.pool_limit);
        options.connect_timeout = Some(DIAL_TIMEOUT);
        options.server_selection_timeout = Some(DIAL_TIMEOUT);
        if !config.username.is_empty() {
            options.credential = Some(
                Credential::builder()
                    .username(config.username.clone())
                    .password(config.password.clone())
                    .source(config.database.clone())
                    .build(),
            );
        }
        if flavor.uses_tls() {
            options.tls = Some(Tls::Enabled(TlsOptions::default()));
        }

        let client =
            Client::with_options(options).map_err(|e| classify(&e, StoreError::Unavailable))?;
        let database = client.database(&config.database);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| classify(&e, StoreError::Unavailable))?;

        let orders = database.collection::<OrderDocument>(&config.collection);
        Ok(Self {
            client,
            database,
            orders,
            flavor,
        })
    }

    /// Flavor this store was dialed as.
    #[must_use]
    pub const fn flavor(&self) -> StoreFlavor {
        self.flavor
    }

    /// Close the driver's connection pool.
    pub async fn shutdown(self) {
        self.client.shutdown().await;
    }
}

impl OrderStore for MongoOrderStore {
    fn insert<'a>(
        &'a self,
        order: &'a Order,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            self.orders
                .insert_one(OrderDocument::from(order))
                .await
                .map_err(|e| classify(&e, StoreError::WriteRejected))?;
            Ok(())
        })
    }

    fn count(&self) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>> {
        Box::pin(async move {
            self.orders
                .count_documents(doc! {})
                .await
                .map_err(|e| classify(&e, StoreError::Query))
        })
    }

    fn ensure_sharding<'a>(
        &'a self,
        spec: &'a ShardSpec,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let mut key = Document::new();
            key.insert(spec.key.clone(), "hashed");

            let reply = self
                .database
                .run_command(doc! {
                    "shardCollection": spec.namespace(),
                    "key": key,
                })
                .await
                .map_err(|e| StoreError::Bootstrap(e.to_string()))?;

            tracing::debug!(reply = %reply, "shardCollection reply");
            Ok(())
        })
    }
}

/// Map a driver error onto the store taxonomy. Errors that don't say anything
/// about reachability, writes or encoding fall back to `otherwise`.
fn classify(error: &MongoError, otherwise: fn(String) -> StoreError) -> StoreError {
    let message = error.to_string();
    match *error.kind {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::ConnectionPoolCleared { .. }
        | ErrorKind::DnsResolve { .. }
        | ErrorKind::Authentication { .. } => StoreError::Unavailable(message),
        ErrorKind::Write(_) => StoreError::WriteRejected(message),
        ErrorKind::BsonSerialization(_) | ErrorKind::BsonDeserialization(_) => {
            StoreError::Serialization(message)
        }
        _ => otherwise(message),
    }
}
