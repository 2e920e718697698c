//! Integration tests for `MongoOrderStore` using testcontainers.
//!
//! # Requirements
//!
//! Docker must be running. The tests start a `mongo` container through
//! testcontainers and are ignored by default:
//!
//! ```text
//! cargo test -p capture-order-mongodb -- --ignored
//! ```

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code uses expect for clear failure messages

use capture_order_core::order::{NewOrder, OrderId};
use capture_order_core::store::{OrderStore, StoreError, StoreFlavor};
use capture_order_mongodb::{MongoConfig, MongoOrderStore};
use capture_order_testing::RecordingTelemetry;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::mongo::Mongo;

fn config(host: String) -> MongoConfig {
    MongoConfig {
        host,
        username: String::new(),
        password: String::new(),
        database: "akschallenge".into(),
        collection: "orders".into(),
        shard_key: "_id".into(),
        pool_limit: 5,
    }
}

/// Start a Mongo container and connect a store to it.
///
/// Returns the container too, to keep it alive for the test.
async fn setup_store() -> (ContainerAsync<Mongo>, MongoOrderStore, MongoConfig) {
    let container = Mongo::default()
        .start()
        .await
        .expect("Failed to start mongo container");
    let port = container
        .get_host_port_ipv4(27017)
        .await
        .expect("Failed to get mongo port");

    let config = config(format!("127.0.0.1:{port}"));
    let telemetry = RecordingTelemetry::new();
    let store = MongoOrderStore::connect(&config, &telemetry)
        .await
        .expect("Failed to connect to mongo");

    let dial = telemetry.dependencies_for("Create session");
    assert_eq!(dial.len(), 1);
    assert!(dial[0].success);

    (container, store, config)
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_insert_and_count() {
    let (_container, store, _config) = setup_store().await;
    assert_eq!(store.flavor(), StoreFlavor::MongoDb);

    let before = store.count().await.expect("count failed");
    for i in 0..3 {
        let order = NewOrder::new(format!("{i}@example.com"), "widget", 1.5).open(OrderId::generate());
        store.insert(&order).await.expect("insert failed");
    }

    assert_eq!(store.count().await.expect("count failed"), before + 3);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_duplicate_id_is_a_rejected_write() {
    let (_container, store, _config) = setup_store().await;
    let order = NewOrder::new("a@b.c", "widget", 1.0).open(OrderId::generate());

    store.insert(&order).await.expect("first insert failed");
    let err = store.insert(&order).await.unwrap_err();

    assert!(matches!(err, StoreError::WriteRejected(_)), "got {err:?}");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_sharding_an_unsharded_deployment_fails_softly() {
    let (_container, store, config) = setup_store().await;

    let result = store.ensure_sharding(&config.shard_spec()).await;

    assert!(matches!(result, Err(StoreError::Bootstrap(_))));
    assert!(store.count().await.is_ok());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_unreachable_store_records_failed_session() {
    let telemetry = RecordingTelemetry::new();
    let mut config = config("127.0.0.1:1".into());
    config.pool_limit = 1;

    let err = MongoOrderStore::connect(&config, &telemetry).await.unwrap_err();

    assert!(matches!(err, StoreError::Unavailable(_)), "got {err:?}");
    assert!(!telemetry.dependencies_for("Create session")[0].success);
    assert_eq!(telemetry.exceptions().len(), 1);
}
