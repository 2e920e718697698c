//! Broker connection manager.
//!
//! Owns the single connection → session → sender link shared by every publish.
//! All sends and reconnects go through one `tokio::sync::Mutex`, so at most one
//! connect cycle runs at a time and no caller ever observes a half-built link.
//!
//! # States
//!
//! ```text
//! Disconnected ──► Connecting ──► Connected ──(detach)──► Detached
//!      ▲               │                                     │
//!      └──(attempt     │                                     ▼
//!         failed)      │                               Reconnecting ──► Connected
//!                      │                                     │
//!                      └──(attempts exhausted)──► Failed ◄───┘
//! ```
//!
//! Between two attempts of a cycle the link sits in `Disconnected` for the
//! retry delay; the next attempt re-enters the cycle's entry state
//! (`Connecting` or `Reconnecting`).
//!
//! `Failed` only ends the current cycle: the next send starts a fresh one.
//!
//! # Generations
//!
//! Every installed link gets a new generation number. A publisher that saw a
//! link detach passes the generation it observed to [`ConnectionManager::reconnect`];
//! if the link has already been replaced by then, the call is a no-op. This is
//! how concurrent detaches collapse into a single reconnect.

use crate::retry::{RetryPolicy, retry_with_backoff};
use capture_order_core::broker::{BrokerConnector, BrokerError, BrokerLink};
use capture_order_core::telemetry::Telemetry;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};

/// Observable state of the broker link.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LinkState {
    /// No link has been requested yet
    Disconnected,
    /// A connect cycle is running
    Connecting,
    /// A link is installed and usable
    Connected,
    /// The peer detached the link; it has been dropped
    Detached,
    /// A reconnect cycle triggered by a detach is running
    Reconnecting,
    /// The last connect cycle ran out of attempts
    Failed,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Detached => "detached",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A failed send, tagged with the generation of the link that was in use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailure {
    /// What went wrong
    pub error: BrokerError,
    /// Generation of the link the send was attempted on
    pub generation: u64,
}

impl fmt::Display for SendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (link generation {})", self.error, self.generation)
    }
}

impl std::error::Error for SendFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

struct Slot {
    link: Option<Box<dyn BrokerLink>>,
    generation: u64,
}

/// Single owner of the shared broker link.
pub struct ConnectionManager {
    connector: Arc<dyn BrokerConnector>,
    telemetry: Arc<dyn Telemetry>,
    policy: RetryPolicy,
    slot: Mutex<Slot>,
    state: watch::Sender<LinkState>,
}

impl ConnectionManager {
    /// Create a manager with the default connect policy (3 attempts, 5 s apart).
    ///
    /// Nothing is dialed until [`connect`](Self::connect) or the first send.
    #[must_use]
    pub fn new(connector: Arc<dyn BrokerConnector>, telemetry: Arc<dyn Telemetry>) -> Self {
        let (state, _) = watch::channel(LinkState::Disconnected);
        Self {
            connector,
            telemetry,
            policy: RetryPolicy::default(),
            slot: Mutex::new(Slot {
                link: None,
                generation: 0,
            }),
            state,
        }
    }

    /// Override the connect cycle's retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Current link state.
    #[must_use]
    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Watch link state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.state.subscribe()
    }

    /// Endpoint the links are opened against, without credentials.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.connector.endpoint()
    }

    /// Target address of the sender link.
    #[must_use]
    pub fn target(&self) -> &str {
        self.connector.target()
    }

    /// Generation of the installed link (0 before the first connect).
    pub async fn generation(&self) -> u64 {
        self.slot.lock().await.generation
    }

    /// Make sure a link is installed, running a connect cycle if needed.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt when the cycle runs out of
    /// attempts.
    pub async fn connect(&self) -> Result<(), BrokerError> {
        let mut slot = self.slot.lock().await;
        if slot.link.is_some() {
            return Ok(());
        }
        self.run_cycle(&mut slot, LinkState::Connecting).await
    }

    /// Send one body over the shared link, connecting first if there is none.
    ///
    /// The send itself is bounded by `deadline`. A detach drops the link and
    /// moves the state to [`LinkState::Detached`]; other failures keep it.
    ///
    /// # Errors
    ///
    /// Returns a [`SendFailure`] carrying the link generation that was used,
    /// for a later [`reconnect`](Self::reconnect).
    pub async fn send(&self, body: &[u8], deadline: Duration) -> Result<(), SendFailure> {
        let mut slot = self.slot.lock().await;

        if slot.link.is_none() {
            tracing::info!(endpoint = %self.endpoint(), "No broker link, connecting");
            self.run_cycle(&mut slot, LinkState::Connecting)
                .await
                .map_err(|error| SendFailure {
                    error,
                    generation: slot.generation,
                })?;
        }

        let generation = slot.generation;
        let Some(link) = slot.link.as_mut() else {
            return Err(SendFailure {
                error: BrokerError::Link("no link installed".to_string()),
                generation,
            });
        };

        let error = match tokio::time::timeout(deadline, link.send(body)).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(error)) => error,
            Err(_) => BrokerError::Timeout(deadline),
        };

        if error.is_detached() {
            tracing::warn!(
                endpoint = %self.endpoint(),
                generation,
                error = %error,
                "Broker link detached"
            );
            if let Some(link) = slot.link.take() {
                tokio::spawn(link.close());
            }
            self.state.send_replace(LinkState::Detached);
        }

        Err(SendFailure { error, generation })
    }

    /// Replace the link observed failing at `stale_generation`.
    ///
    /// A no-op success when another task has already installed a newer link.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt when the cycle runs out of
    /// attempts.
    pub async fn reconnect(&self, stale_generation: u64) -> Result<(), BrokerError> {
        let mut slot = self.slot.lock().await;

        if slot.generation != stale_generation && slot.link.is_some() {
            tracing::debug!(
                stale_generation,
                current_generation = slot.generation,
                "Link already replaced, skipping reconnect"
            );
            return Ok(());
        }

        if let Some(link) = slot.link.take() {
            tokio::spawn(link.close());
        }
        self.run_cycle(&mut slot, LinkState::Reconnecting).await
    }

    /// Close the installed link, if any.
    pub async fn close(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(link) = slot.link.take() {
            link.close().await;
            tracing::info!(endpoint = %self.endpoint(), "Broker link closed");
        }
        self.state.send_replace(LinkState::Disconnected);
    }

    async fn run_cycle(&self, slot: &mut Slot, entry: LinkState) -> Result<(), BrokerError> {
        self.state.send_replace(entry);

        let mut attempt = 0usize;
        let max_attempts = self.policy.max_attempts;
        let result = retry_with_backoff(&self.policy, move || {
            attempt += 1;
            if attempt > 1 {
                self.state.send_replace(entry);
            }
            let connector = &self.connector;
            let telemetry = &self.telemetry;
            let state = &self.state;
            async move {
                tracing::info!(
                    endpoint = %connector.endpoint(),
                    target = %connector.target(),
                    attempt,
                    "Attempting to connect to broker"
                );
                let result = connector.connect().await;
                if let Err(error) = &result {
                    telemetry.record_exception(error);
                    if attempt < max_attempts {
                        state.send_replace(LinkState::Disconnected);
                    }
                }
                result
            }
        })
        .await;

        match result {
            Ok(link) => {
                slot.link = Some(link);
                slot.generation += 1;
                self.state.send_replace(LinkState::Connected);
                tracing::info!(
                    endpoint = %self.endpoint(),
                    generation = slot.generation,
                    "Connected to broker"
                );
                Ok(())
            }
            Err(error) => {
                self.state.send_replace(LinkState::Failed);
                tracing::error!(
                    endpoint = %self.endpoint(),
                    attempts = self.policy.max_attempts,
                    error = %error,
                    "Couldn't connect to broker"
                );
                Err(error)
            }
        }
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.endpoint())
            .field("state", &self.state())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
