//! Scripted broker for testing publish, detach and reconnect paths.
//!
//! [`ScriptedConnector`] hands out [`BrokerLink`]s whose behaviour is driven by
//! two queues: one of connect outcomes and one of send outcomes. An empty queue
//! means success. All links created by one connector share the same script, so
//! a test can queue "detach, then succeed" without caring which link instance
//! ends up sending.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use capture_order_core::broker::{BrokerConnector, BrokerError, BrokerLink};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Script {
    connects: VecDeque<Result<(), BrokerError>>,
    sends: VecDeque<Result<(), BrokerError>>,
    send_delay: Duration,
    sent: Vec<Vec<u8>>,
}

#[derive(Debug, Default)]
struct Counters {
    connects: AtomicUsize,
    sends: AtomicUsize,
    closes: AtomicUsize,
}

/// Broker connector with scripted outcomes.
///
/// # Example
///
/// ```
/// use capture_order_testing::ScriptedConnector;
/// use capture_order_core::broker::{BrokerConnector, BrokerError};
///
/// # async fn example() -> Result<(), BrokerError> {
/// let connector = ScriptedConnector::new("orders");
/// connector.push_send(Err(BrokerError::Detached("forced".into())));
///
/// let mut link = connector.connect().await?;
/// assert!(link.send(b"{}").await.unwrap_err().is_detached());
/// assert!(link.send(b"{}").await.is_ok());
/// assert_eq!(connector.connect_count(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ScriptedConnector {
    target: String,
    endpoint: String,
    script: Arc<Mutex<Script>>,
    counters: Arc<Counters>,
}

impl ScriptedConnector {
    /// Create a connector attached to `target`.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        let target = target.into();
        Self {
            endpoint: format!("amqps://scripted.test/{target}"),
            target,
            script: Arc::new(Mutex::new(Script::default())),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Queue the outcome of the next connect attempt.
    pub fn push_connect(&self, outcome: Result<(), BrokerError>) {
        self.script.lock().unwrap().connects.push_back(outcome);
    }

    /// Queue `n` failing connect attempts.
    pub fn fail_connects(&self, n: usize, error: &BrokerError) {
        for _ in 0..n {
            self.push_connect(Err(error.clone()));
        }
    }

    /// Queue the outcome of the next send, on whichever link performs it.
    pub fn push_send(&self, outcome: Result<(), BrokerError>) {
        self.script.lock().unwrap().sends.push_back(outcome);
    }

    /// Make every send take `delay` before completing.
    pub fn set_send_delay(&self, delay: Duration) {
        self.script.lock().unwrap().send_delay = delay;
    }

    /// Number of connect attempts made
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }

    /// Number of send attempts made
    #[must_use]
    pub fn send_count(&self) -> usize {
        self.counters.sends.load(Ordering::SeqCst)
    }

    /// Number of links closed
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }

    /// Bodies of all successfully sent messages
    #[must_use]
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.script.lock().unwrap().sent.clone()
    }
}

impl BrokerConnector for ScriptedConnector {
    fn connect(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn BrokerLink>, BrokerError>> + Send + '_>> {
        Box::pin(async move {
            self.counters.connects.fetch_add(1, Ordering::SeqCst);
            let outcome = self
                .script
                .lock()
                .unwrap()
                .connects
                .pop_front()
                .unwrap_or(Ok(()));

            outcome.map(|()| {
                Box::new(ScriptedLink {
                    script: Arc::clone(&self.script),
                    counters: Arc::clone(&self.counters),
                }) as Box<dyn BrokerLink>
            })
        })
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Link handed out by [`ScriptedConnector`].
#[derive(Debug)]
pub struct ScriptedLink {
    script: Arc<Mutex<Script>>,
    counters: Arc<Counters>,
}

impl BrokerLink for ScriptedLink {
    fn send<'a>(
        &'a mut self,
        body: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + 'a>> {
        Box::pin(async move {
            self.counters.sends.fetch_add(1, Ordering::SeqCst);
            let delay = self.script.lock().unwrap().send_delay;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let mut script = self.script.lock().unwrap();
            let outcome = script.sends.pop_front().unwrap_or(Ok(()));
            if outcome.is_ok() {
                script.sent.push(body.to_vec());
            }
            outcome
        })
    }

    fn close(self: Box<Self>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        })
    }
}
