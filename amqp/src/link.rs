//! Sender link over an AMQP 1.0 session.

use capture_order_core::broker::{BrokerError, BrokerLink};
use fe2o3_amqp::connection::ConnectionHandle;
use fe2o3_amqp::link::SendError;
use fe2o3_amqp::session::SessionHandle;
use fe2o3_amqp::types::messaging::{Message, Outcome};
use fe2o3_amqp::types::primitives::Binary;
use fe2o3_amqp::Sender;
use std::future::Future;
use std::pin::Pin;

/// One connection, one session on it, one sender attached to the target.
///
/// Dropping the link without [`BrokerLink::close`] leaves the driver to tear
/// the connection down in the background.
pub struct AmqpLink {
    connection: ConnectionHandle<()>,
    session: SessionHandle<()>,
    sender: Sender,
}

impl AmqpLink {
    pub(crate) const fn new(
        connection: ConnectionHandle<()>,
        session: SessionHandle<()>,
        sender: Sender,
    ) -> Self {
        Self {
            connection,
            session,
            sender,
        }
    }
}

impl std::fmt::Debug for AmqpLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpLink").finish_non_exhaustive()
    }
}

impl BrokerLink for AmqpLink {
    fn send<'a>(
        &'a mut self,
        body: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + 'a>> {
        Box::pin(async move {
            let message = Message::builder()
                .data(Binary::from(body.to_vec()))
                .build();

            match self.sender.send(message).await {
                Ok(outcome) => settle(outcome),
                Err(error) => Err(classify(&error)),
            }
        })
    }

    fn close(self: Box<Self>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        let Self {
            mut connection,
            mut session,
            sender,
        } = *self;

        Box::pin(async move {
            if let Err(error) = sender.close().await {
                tracing::debug!(error = %error, "Sender close failed");
            }
            if let Err(error) = session.end().await {
                tracing::debug!(error = %error, "Session end failed");
            }
            if let Err(error) = connection.close().await {
                tracing::debug!(error = %error, "Connection close failed");
            }
        })
    }
}

/// Anything but `Accepted` means the broker did not take the message.
fn settle(outcome: Outcome) -> Result<(), BrokerError> {
    match outcome {
        Outcome::Accepted(_) => Ok(()),
        other => Err(BrokerError::Rejected(format!("{other:?}"))),
    }
}

/// Link state errors all mean the link is gone: remote detach, remote close
/// or a session that ended underneath it.
fn classify(error: &SendError) -> BrokerError {
    match error {
        SendError::LinkStateError(_) | SendError::Detached(_) => {
            BrokerError::Detached(error.to_string())
        }
        _ => BrokerError::Send(error.to_string()),
    }
}
