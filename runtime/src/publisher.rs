//! Forwards persisted orders to the broker.
//!
//! Publishing is best effort: the caller only learns `true`/`false`, and a
//! failed publish never undoes the store write that preceded it.
//!
//! # Retry rules
//!
//! Up to three attempts, each with its own 5 second deadline:
//!
//! - the link detached → reconnect, then try again;
//! - the reconnect cycle itself failed → stop;
//! - anything else (deadline, rejection, failed lazy connect) → stop at once.

use crate::connection::{ConnectionManager, SendFailure};
use crate::retry::{RetryPolicy, retry_with_predicate};
use capture_order_core::broker::{BrokerError, OrderMessage};
use capture_order_core::order::Order;
use capture_order_core::telemetry::{DependencyRecord, EventRecord, SERVICE_NAME, Telemetry};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Deadline for a single send attempt.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum send attempts per order.
pub const MAX_SEND_ATTEMPTS: usize = 3;

/// Why a publish gave up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The link detached; retried while attempts remain
    #[error("broker link detached: {0}")]
    Detached(BrokerError),

    /// Reconnecting after a detach failed
    #[error("reconnect after detach failed: {0}")]
    Reconnect(BrokerError),

    /// Any other send failure
    #[error("send failed: {0}")]
    Send(BrokerError),
}

impl PublishError {
    /// Only a detach followed by a successful reconnect is worth another attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Detached(_))
    }
}

/// Publishes order notifications through a [`ConnectionManager`].
#[derive(Clone)]
pub struct OrderPublisher {
    manager: Option<Arc<ConnectionManager>>,
    telemetry: Arc<dyn Telemetry>,
    team: String,
    send_timeout: Duration,
    max_attempts: usize,
}

impl OrderPublisher {
    /// Create a publisher. With no manager every publish succeeds immediately.
    #[must_use]
    pub fn new(
        manager: Option<Arc<ConnectionManager>>,
        telemetry: Arc<dyn Telemetry>,
        team: impl Into<String>,
    ) -> Self {
        Self {
            manager,
            telemetry,
            team: team.into(),
            send_timeout: SEND_TIMEOUT,
            max_attempts: MAX_SEND_ATTEMPTS,
        }
    }

    /// A publisher for deployments without a broker.
    #[must_use]
    pub fn disabled(telemetry: Arc<dyn Telemetry>, team: impl Into<String>) -> Self {
        Self::new(None, telemetry, team)
    }

    /// Override the per-attempt deadline.
    #[must_use]
    pub const fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Whether a broker is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.manager.is_some()
    }

    /// The connection manager, when a broker is configured.
    #[must_use]
    pub const fn manager(&self) -> Option<&Arc<ConnectionManager>> {
        self.manager.as_ref()
    }

    /// Publish the notification for a persisted order.
    ///
    /// Returns `true` when the broker accepted the message, or when no broker
    /// is configured.
    pub async fn publish(&self, order: &Order) -> bool {
        let Some(manager) = &self.manager else {
            tracing::info!(
                order_id = %order.id(),
                "Skipping broker publish, no broker configured"
            );
            return true;
        };

        let started = Instant::now();
        let result = self.send_with_retry(manager, order).await;
        let duration = started.elapsed();
        let success = result.is_ok();

        if success {
            self.telemetry.record_event(
                EventRecord::new("SendOrder to ServiceBus")
                    .with("team", self.team.as_str())
                    .with("sequence", "2")
                    .with("type", "servicebus")
                    .with("service", SERVICE_NAME)
                    .with("orderId", order.id().as_str()),
            );
        }

        self.telemetry.record_dependency(DependencyRecord {
            name: "ServiceBus".to_string(),
            dependency_type: "AMQP".to_string(),
            target: manager.endpoint().to_string(),
            data: "Send message".to_string(),
            success,
            duration,
            result_code: result.as_ref().err().map(ToString::to_string),
        });

        match &result {
            Ok(()) => tracing::info!(
                order_id = %order.id(),
                endpoint = %manager.endpoint(),
                target = %manager.target(),
                duration_ms = duration.as_millis(),
                "Sent order to broker"
            ),
            Err(error) => tracing::error!(
                order_id = %order.id(),
                endpoint = %manager.endpoint(),
                error = %error,
                "Failed to send order to broker"
            ),
        }

        success
    }

    async fn send_with_retry(
        &self,
        manager: &ConnectionManager,
        order: &Order,
    ) -> Result<(), PublishError> {
        let body = OrderMessage::new(order.id(), self.team.as_str())
            .to_body()
            .map_err(|error| {
                self.telemetry.record_exception(&error);
                PublishError::Send(error)
            })?;

        let policy = RetryPolicy::builder()
            .max_attempts(self.max_attempts)
            .delay(Duration::ZERO)
            .build();

        let body = body.as_slice();
        retry_with_predicate(
            &policy,
            move || async move {
                match manager.send(body, self.send_timeout).await {
                    Ok(()) => Ok(()),
                    Err(SendFailure { error, generation }) if error.is_detached() => {
                        tracing::warn!(
                            order_id = %order.id(),
                            error = %error,
                            "Broker detached, reconnecting before retry"
                        );
                        manager
                            .reconnect(generation)
                            .await
                            .map_err(PublishError::Reconnect)?;
                        Err(PublishError::Detached(error))
                    }
                    Err(SendFailure { error, .. }) => {
                        // The connect cycle already recorded each failed attempt.
                        if !error.is_connect_failure() {
                            self.telemetry.record_exception(&error);
                        }
                        Err(PublishError::Send(error))
                    }
                }
            },
            PublishError::is_retryable,
        )
        .await
    }
}

impl std::fmt::Debug for OrderPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderPublisher")
            .field("manager", &self.manager)
            .field("team", &self.team)
            .field("send_timeout", &self.send_timeout)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use capture_order_core::order::{NewOrder, OrderId};
    use capture_order_testing::{RecordingTelemetry, ScriptedConnector};

    fn order() -> Order {
        NewOrder::new("a@b.c", "widget", 3.5).open(OrderId::from_existing("order-1".into()))
    }

    fn publisher(connector: &ScriptedConnector, telemetry: &RecordingTelemetry) -> OrderPublisher {
        let telemetry: Arc<dyn Telemetry> = Arc::new(telemetry.clone());
        let manager = ConnectionManager::new(Arc::new(connector.clone()), Arc::clone(&telemetry))
            .with_retry_policy(
                RetryPolicy::builder()
                    .delay(Duration::from_millis(1))
                    .build(),
            );
        OrderPublisher::new(Some(Arc::new(manager)), telemetry, "team-azure")
    }

    #[tokio::test]
    async fn disabled_publisher_succeeds_without_records() {
        let telemetry = RecordingTelemetry::new();
        let publisher = OrderPublisher::disabled(Arc::new(telemetry.clone()), "team");

        assert!(publisher.publish(&order()).await);
        assert!(!publisher.is_enabled());
        assert!(telemetry.dependencies().is_empty());
        assert!(telemetry.events().is_empty());
    }

    #[tokio::test]
    async fn successful_publish_sends_body_and_records() {
        let connector = ScriptedConnector::new("orders");
        let telemetry = RecordingTelemetry::new();

        assert!(publisher(&connector, &telemetry).publish(&order()).await);

        assert_eq!(
            connector.sent(),
            vec![br#"{"order":"order-1","source":"team-azure"}"#.to_vec()]
        );

        let events = telemetry.events_named("SendOrder to ServiceBus");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].property("sequence"), Some("2"));
        assert_eq!(events[0].property("type"), Some("servicebus"));
        assert_eq!(events[0].property("service"), Some("CaptureOrder"));
        assert_eq!(events[0].property("team"), Some("team-azure"));
        assert_eq!(events[0].property("orderId"), Some("order-1"));

        let deps = telemetry.dependencies();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "ServiceBus");
        assert_eq!(deps[0].dependency_type, "AMQP");
        assert_eq!(deps[0].data, "Send message");
        assert_eq!(deps[0].target, "amqps://scripted.test/orders");
        assert!(deps[0].success);
        assert_eq!(deps[0].result_code, None);
    }

    #[tokio::test]
    async fn detach_reconnects_and_retries() {
        let connector = ScriptedConnector::new("orders");
        connector.push_send(Err(BrokerError::Detached("forced".into())));
        let telemetry = RecordingTelemetry::new();

        assert!(publisher(&connector, &telemetry).publish(&order()).await);

        assert_eq!(connector.send_count(), 2);
        assert_eq!(connector.connect_count(), 2);
        assert_eq!(connector.sent().len(), 1);
        assert!(telemetry.exceptions().is_empty());
    }

    #[tokio::test]
    async fn three_detaches_exhaust_the_attempts() {
        let connector = ScriptedConnector::new("orders");
        for _ in 0..3 {
            connector.push_send(Err(BrokerError::Detached("forced".into())));
        }
        let telemetry = RecordingTelemetry::new();

        assert!(!publisher(&connector, &telemetry).publish(&order()).await);

        assert_eq!(connector.send_count(), 3);
        assert!(telemetry.events().is_empty());
        let deps = telemetry.dependencies();
        assert!(!deps[0].success);
        assert!(deps[0].result_code.as_deref().unwrap().contains("detached"));
    }

    #[tokio::test]
    async fn failed_reconnect_stops_retrying() {
        let connector = ScriptedConnector::new("orders");
        let telemetry = RecordingTelemetry::new();
        let publisher = publisher(&connector, &telemetry);
        publisher.manager().unwrap().connect().await.unwrap();

        connector.push_send(Err(BrokerError::Detached("forced".into())));
        connector.fail_connects(3, &BrokerError::Connect("refused".into()));

        assert!(!publisher.publish(&order()).await);

        assert_eq!(connector.send_count(), 1);
        assert_eq!(connector.connect_count(), 4);
        assert_eq!(telemetry.exceptions().len(), 3);
    }

    #[tokio::test]
    async fn failed_lazy_connect_records_each_attempt_once() {
        let connector = ScriptedConnector::new("orders");
        connector.fail_connects(3, &BrokerError::Connect("refused".into()));
        let telemetry = RecordingTelemetry::new();

        assert!(!publisher(&connector, &telemetry).publish(&order()).await);

        assert_eq!(connector.connect_count(), 3);
        assert_eq!(connector.send_count(), 0);
        assert_eq!(telemetry.exceptions().len(), 3);
        let deps = telemetry.dependencies();
        assert_eq!(deps.len(), 1);
        assert!(!deps[0].success);
    }

    #[tokio::test]
    async fn other_errors_fail_fast() {
        let connector = ScriptedConnector::new("orders");
        connector.push_send(Err(BrokerError::Rejected("amqp:not-found".into())));
        let telemetry = RecordingTelemetry::new();

        assert!(!publisher(&connector, &telemetry).publish(&order()).await);

        assert_eq!(connector.send_count(), 1);
        assert_eq!(telemetry.exceptions().len(), 1);
        assert_eq!(telemetry.dependencies().len(), 1);
    }

    #[tokio::test]
    async fn deadline_expiry_fails_fast() {
        let connector = ScriptedConnector::new("orders");
        connector.set_send_delay(Duration::from_millis(200));
        let telemetry = RecordingTelemetry::new();
        let publisher =
            publisher(&connector, &telemetry).with_send_timeout(Duration::from_millis(20));

        assert!(!publisher.publish(&order()).await);

        assert_eq!(connector.send_count(), 1);
        assert_eq!(telemetry.exceptions().len(), 1);
        assert!(telemetry.exceptions()[0].contains("timed out"));
    }
}
