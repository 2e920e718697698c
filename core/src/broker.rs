//! Message broker abstraction for forwarding persisted orders.
//!
//! The broker side of the pipeline is modelled as two traits:
//!
//! - [`BrokerConnector`] knows how to build one connection → session → link
//!   triple against a target address.
//! - [`BrokerLink`] is that established triple; it sends message bodies until it
//!   fails.
//!
//! The runtime's connection manager owns at most one live [`BrokerLink`] and
//! asks the connector for a fresh one when the link detaches.
//!
//! ```text
//! ┌──────────────┐  connect()   ┌──────────────────────────────┐
//! │  Connector   │─────────────►│ connection → session → link  │
//! └──────────────┘              └──────────────┬───────────────┘
//!                                              │ send(body)
//!                                              ▼
//!                                        ┌───────────┐
//!                                        │  target   │
//!                                        └───────────┘
//! ```
//!
//! # Implementations
//!
//! - `AmqpConnector` (in `capture-order-amqp`): AMQP 1.0 via `fe2o3-amqp`
//! - `ScriptedConnector` (in `capture-order-testing`): scripted outcomes for tests

use crate::order::OrderId;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during broker operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Failed to open the transport connection
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Failed to begin a session on the connection
    #[error("Session failed: {0}")]
    Session(String),

    /// Failed to attach the sender link
    #[error("Link attach failed: {0}")]
    Link(String),

    /// The remote peer detached the link
    #[error("Link detached: {0}")]
    Detached(String),

    /// The send did not complete before its deadline
    #[error("Send timed out after {0:?}")]
    Timeout(Duration),

    /// The send failed for any other reason
    #[error("Send failed: {0}")]
    Send(String),

    /// The broker settled the message with a non-accepted outcome
    #[error("Message rejected: {0}")]
    Rejected(String),

    /// The message body could not be encoded
    #[error("Encode failed: {0}")]
    Encode(String),
}

impl BrokerError {
    /// Whether the failure is a link detach.
    ///
    /// Detach is the only condition the publisher treats as recoverable.
    #[must_use]
    pub const fn is_detached(&self) -> bool {
        matches!(self, Self::Detached(_))
    }

    /// Whether the failure happened while establishing the link.
    #[must_use]
    pub const fn is_connect_failure(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Session(_) | Self::Link(_))
    }
}

/// Body sent to the broker for each persisted order.
///
/// Serializes to `{"order":"<id>","source":"<team>"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderMessage {
    /// Identifier of the persisted order
    pub order: String,
    /// Originating team / tenant tag
    pub source: String,
}

impl OrderMessage {
    /// Build the message for an order.
    #[must_use]
    pub fn new(order: &OrderId, source: impl Into<String>) -> Self {
        Self {
            order: order.as_str().to_string(),
            source: source.into(),
        }
    }

    /// Encode as a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Encode`] if serialization fails.
    pub fn to_body(&self) -> Result<Vec<u8>, BrokerError> {
        serde_json::to_vec(self).map_err(|e| BrokerError::Encode(e.to_string()))
    }
}

/// An established connection → session → sender link.
///
/// Sending takes `&mut self`: a link is used by one sender at a time, and the
/// connection manager serializes access. `Send` is enough for the link to live
/// behind the manager's mutex.
pub trait BrokerLink: Send {
    /// Send one message body over the link.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Detached`] if the peer detached the link, or
    /// another [`BrokerError`] for any other failure.
    fn send<'a>(
        &'a mut self,
        body: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + 'a>>;

    /// Close link, session and connection, best effort.
    fn close(self: Box<Self>) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// Factory for broker links.
pub trait BrokerConnector: Send + Sync {
    /// Open a connection, a session on it, and a sender link to the target.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Connect`], [`BrokerError::Session`] or
    /// [`BrokerError::Link`] depending on which step failed.
    fn connect(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn BrokerLink>, BrokerError>> + Send + '_>>;

    /// Target address the links are attached to.
    fn target(&self) -> &str;

    /// Endpoint description safe to log (no credentials).
    fn endpoint(&self) -> &str;
}
