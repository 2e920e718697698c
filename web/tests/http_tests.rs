//! HTTP tests for the order capture router.
//!
//! Drives the real router with `axum-test` over the in-memory store and the
//! scripted broker.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use axum::http::{HeaderValue, StatusCode, header};
use axum_test::TestServer;
use capture_order_core::broker::BrokerError;
use capture_order_core::store::StoreError;
use capture_order_core::telemetry::Telemetry;
use capture_order_runtime::{
    ConnectionManager, DocumentStoreWriter, OrderIngestion, OrderPublisher, RetryPolicy,
};
use capture_order_testing::{InMemoryOrderStore, RecordingTelemetry, ScriptedConnector};
use capture_order_web::handlers::orders::{CreatedOrder, OrderCount};
use capture_order_web::{AppState, router};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

const TEAM: &str = "team-azure";

struct Harness {
    server: TestServer,
    store: InMemoryOrderStore,
    connector: ScriptedConnector,
    telemetry: RecordingTelemetry,
}

fn harness() -> Harness {
    let store = InMemoryOrderStore::new();
    let connector = ScriptedConnector::new("orders");
    let telemetry = RecordingTelemetry::new();
    let sink: Arc<dyn Telemetry> = Arc::new(telemetry.clone());

    let manager = Arc::new(
        ConnectionManager::new(Arc::new(connector.clone()), Arc::clone(&sink)).with_retry_policy(
            RetryPolicy::builder()
                .delay(Duration::from_millis(1))
                .build(),
        ),
    );
    let writer = DocumentStoreWriter::new(Arc::new(store.clone()), Arc::clone(&sink), "orders-mongodb")
        .with_team(TEAM);
    let publisher = OrderPublisher::new(Some(manager), Arc::clone(&sink), TEAM);
    let ingestion = OrderIngestion::new(writer, publisher, sink, TEAM);

    Harness {
        server: TestServer::new(router(AppState::new(ingestion))).expect("test server"),
        store,
        connector,
        telemetry,
    }
}

fn order_body() -> Value {
    json!({"emailAddress": "jane@example.com", "product": "widget", "total": 12.5})
}

#[tokio::test]
async fn test_create_order_returns_the_persisted_id() {
    let h = harness();

    let response = h.server.post("/v1/order").json(&order_body()).await;

    response.assert_status_ok();
    let created: CreatedOrder = response.json();
    let stored = h.store.orders();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id().as_str(), created.order_id);
    assert_eq!(stored[0].email_address(), "jane@example.com");
    assert_eq!(h.connector.sent().len(), 1);
}

#[tokio::test]
async fn test_unpublished_order_is_still_captured() {
    let h = harness();
    h.connector.push_send(Err(BrokerError::Send("link credit exhausted".into())));

    let response = h.server.post("/v1/order").json(&order_body()).await;

    response.assert_status_ok();
    assert_eq!(h.store.len(), 1);
    assert!(h.connector.sent().is_empty());
    assert_eq!(h.telemetry.requests()[0].response_code, "500");
}

#[tokio::test]
async fn test_store_failure_is_a_500_with_error_body() {
    let h = harness();
    h.store
        .fail_next_insert(StoreError::Unavailable("no reachable servers".into()));

    let response = h.server.post("/v1/order").json(&order_body()).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(
        body["error"],
        "order not added to MongoDB. Check logs: Store unavailable: no reachable servers"
    );
    assert_eq!(h.connector.send_count(), 0);
}

#[tokio::test]
async fn test_malformed_json_is_a_400() {
    let h = harness();

    let response = h
        .server
        .post("/v1/order")
        .content_type("application/json")
        .text("{\"emailAddress\": ")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].is_string());
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_order_count() {
    let h = harness();
    for _ in 0..3 {
        h.server.post("/v1/order").json(&order_body()).await.assert_status_ok();
    }

    let response = h.server.get("/v1/order").await;

    response.assert_status_ok();
    let count: OrderCount = response.json();
    assert_eq!(count.order_count, "3");
    assert!(chrono::DateTime::parse_from_rfc3339(&count.timestamp).is_ok());
}

#[tokio::test]
async fn test_order_count_failure_is_a_500() {
    let h = harness();
    h.store
        .fail_count(Some(StoreError::Query("cursor killed".into())));

    let response = h.server.get("/v1/order").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("cursor killed"));
}

#[tokio::test]
async fn test_healthz() {
    let h = harness();

    let response = h.server.get("/healthz").await;

    response.assert_status_ok();
    response.assert_text("i'm alive!");
}

#[tokio::test]
async fn test_metrics_disabled_is_a_404() {
    let h = harness();

    h.server
        .get("/metrics")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let h = harness();

    let response = h
        .server
        .get("/healthz")
        .add_header(header::ORIGIN, HeaderValue::from_static("http://portal.example.com"))
        .await;

    response.assert_status_ok();
    assert_eq!(response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN), "*");
}
