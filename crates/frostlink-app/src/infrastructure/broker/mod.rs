//! Broker session management.
//!
//! Owns the publish/subscribe connection lifecycle: connect, subscribe,
//! publish, disconnect, and reconnect with a fixed backoff.  The concrete
//! wire transport is abstracted behind [`BrokerTransport`] so the session
//! logic is fully testable without a broker:
//!
//! - `rumqttc.rs` – the real MQTT binding.
//! - `mock.rs`    – a recording mock for tests.
//!
//! # Architecture
//!
//! ```text
//! BrokerSession::connect()            TransportEvent channel
//!   │ exactly one attempt               │ ConnectionStatus / Message
//!   ▼                                   ▼
//! transport.connect() ──ok──► Connected ──► auto-subscribe topic set
//!   │                                   │
//!   └─err──► Disconnected ◄─────────────┘ involuntary drop
//!                │  ▲
//!     retry timer│  │ handle_retry_elapsed()
//!                ▼  │
//!          (fixed delay, single pending)
//! ```
//!
//! The session emits [`SessionEvent`]s on its own channel; the dispatch loop
//! routes `MessageReceived` into the device monitor and surfaces
//! `StatusChanged` to whatever is observing connectivity.
//!
//! # Retry policy
//!
//! On any involuntary disconnect or connect failure, exactly one retry is
//! scheduled after a fixed delay; retries continue until a connect succeeds
//! or a voluntary `disconnect()` cancels the chain.  The single-pending
//! guarantee comes from [`OneShotTimer::start`] being a no-op while a delay
//! is already scheduled.

pub mod mock;
pub mod rumqttc;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::infrastructure::timer::OneShotTimer;

/// Error type for broker session operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The operation requires a connected session.
    #[error("operation requires a connected broker session")]
    NotConnected,
    /// The initial connect was rejected.
    #[error("broker connection failed: {0}")]
    ConnectionFailed(String),
    /// An established connection dropped involuntarily.
    #[error("broker connection lost: {0}")]
    ConnectionLost(String),
    /// A subscribe was rejected; non-fatal to the session.
    #[error("subscribe to {topic:?} failed: {reason}")]
    SubscribeFailed { topic: String, reason: String },
    /// A publish was rejected; non-fatal to the session.
    #[error("publish to {topic:?} failed: {reason}")]
    PublishFailed { topic: String, reason: String },
}

/// Delivery guarantee requested for a subscription or publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QosLevel {
    /// Fire-and-forget.
    AtMostOnce,
    /// Acknowledged delivery.
    AtLeastOnce,
}

/// Connection parameters handed to the transport.
#[derive(Debug, Clone)]
pub struct BrokerOptions {
    /// `host:port`, optionally prefixed with a scheme (`mqtt://…`).
    pub url: String,
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub keep_alive: Duration,
}

/// Events produced by a transport implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The link came up or went down.  `error` is set on involuntary drops.
    ConnectionStatus {
        connected: bool,
        error: Option<String>,
    },
    /// An inbound message on a subscribed topic.
    Message { topic: String, payload: Vec<u8> },
}

/// The wire side of the broker link.
///
/// Implementations are constructed together with the [`TransportEvent`]
/// receiver their asynchronous events arrive on (`RumqttcTransport::new`,
/// `MockBroker::new`).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerTransport: Send {
    /// Attempts one connection.  `Ok` means the broker acknowledged the
    /// session; later drops arrive as `ConnectionStatus` events.
    async fn connect(&mut self, opts: &BrokerOptions) -> Result<(), SessionError>;

    /// Closes the link.  Safe to call when not connected.
    async fn disconnect(&mut self);

    async fn subscribe(&mut self, topic: &str, qos: QosLevel) -> Result<(), SessionError>;

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QosLevel,
    ) -> Result<(), SessionError>;
}

/// Session connection state.  Transitions are serialized because every
/// mutation happens on the owning dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// The fixed topic set the session subscribes to on every (re)connect.
#[derive(Debug, Clone)]
pub struct TopicSet {
    /// Decimal telemetry readings (read).
    pub telemetry: String,
    /// Boolean status flag, `"1"`/other (read).
    pub status: String,
    /// Boolean command, `"1"`/`"0"` (write-only from this side).
    pub control: String,
}

/// Events the session emits to its observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Connectivity changed; `error` carries the failure text while down.
    StatusChanged {
        connected: bool,
        error: Option<String>,
    },
    /// An inbound message, payload decoded as UTF-8 (lossy — the appliance
    /// speaks plain text).
    MessageReceived { topic: String, payload: String },
    /// A per-topic subscribe failed; the session itself stays up.
    SubscribeFailed { topic: String, reason: String },
}

/// The broker session manager.
///
/// Exactly one session exists per process.  All methods take `&mut self` and
/// are invoked from the single dispatch loop; there is no interior locking.
pub struct BrokerSession<T: BrokerTransport> {
    transport: T,
    opts: BrokerOptions,
    topics: TopicSet,
    state: SessionState,
    last_error: Option<String>,
    retry: OneShotTimer,
    retry_delay: Duration,
    /// Set by `disconnect()`; suppresses the retry chain.
    voluntary: bool,
    event_tx: mpsc::Sender<SessionEvent>,
}

impl<T: BrokerTransport> BrokerSession<T> {
    /// Creates a disconnected session.
    ///
    /// Returns the session, the [`SessionEvent`] receiver for observers, and
    /// the retry-timer receiver the dispatch loop must forward into
    /// [`BrokerSession::handle_retry_elapsed`].
    pub fn new(
        transport: T,
        opts: BrokerOptions,
        topics: TopicSet,
        retry_delay: Duration,
    ) -> (Self, mpsc::Receiver<SessionEvent>, mpsc::Receiver<()>) {
        let (event_tx, event_rx) = mpsc::channel(64);
        let (retry, retry_rx) = OneShotTimer::new("broker-retry");
        let session = Self {
            transport,
            opts,
            topics,
            state: SessionState::Disconnected,
            last_error: None,
            retry,
            retry_delay,
            voluntary: false,
            event_tx,
        };
        (session, event_rx, retry_rx)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Transport access for tests that inspect the recording mock.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Attempts exactly one connection.
    ///
    /// A call while an attempt is in flight or a connection is live is a
    /// no-op returning the current state — never a second in-flight connect.
    pub async fn connect(&mut self) -> SessionState {
        if self.state != SessionState::Disconnected {
            debug!(state = ?self.state, "connect ignored; session not idle");
            return self.state;
        }

        self.voluntary = false;
        self.state = SessionState::Connecting;
        info!(url = %self.opts.url, client_id = %self.opts.client_id, "connecting to broker");

        match self.transport.connect(&self.opts).await {
            Ok(()) => {
                self.state = SessionState::Connected;
                self.last_error = None;
                info!("broker session established");
                self.emit_status(true, None).await;
                self.subscribe_topic_set().await;
            }
            Err(e) => {
                let reason = e.to_string();
                warn!("broker connect failed: {reason}");
                self.state = SessionState::Disconnected;
                self.last_error = Some(reason.clone());
                self.emit_status(false, Some(reason)).await;
                self.schedule_retry();
            }
        }
        self.state
    }

    /// Voluntarily closes the session and cancels the retry chain.
    ///
    /// Idempotent: safe on an already-disconnected session.
    pub async fn disconnect(&mut self) {
        self.voluntary = true;
        self.retry.cancel();

        if self.state == SessionState::Disconnected {
            return;
        }
        self.transport.disconnect().await;
        self.state = SessionState::Disconnected;
        self.last_error = None;
        info!("broker session closed");
        self.emit_status(false, None).await;
    }

    /// Subscribes to a topic.  Fails fast when not connected.
    pub async fn subscribe(&mut self, topic: &str, qos: QosLevel) -> Result<(), SessionError> {
        if self.state != SessionState::Connected {
            return Err(SessionError::NotConnected);
        }
        self.transport.subscribe(topic, qos).await
    }

    /// Publishes a payload.  Fails fast when not connected.
    pub async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QosLevel,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Connected {
            return Err(SessionError::NotConnected);
        }
        self.transport.publish(topic, payload, qos).await
    }

    /// Handles one asynchronous transport event.
    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::ConnectionStatus { connected: true, .. } => {
                // Transport-level recovery (not produced by the rumqttc
                // binding, which reports drops and lets the session retry).
                self.state = SessionState::Connected;
                self.last_error = None;
                self.emit_status(true, None).await;
                self.subscribe_topic_set().await;
            }
            TransportEvent::ConnectionStatus {
                connected: false,
                error,
            } => {
                if self.state == SessionState::Disconnected {
                    // Stale event from a link we already tore down.
                    return;
                }
                let reason = error.unwrap_or_else(|| "connection lost".to_string());
                warn!("broker connection lost: {reason}");
                self.transport.disconnect().await;
                self.state = SessionState::Disconnected;
                self.last_error = Some(reason.clone());
                self.emit_status(false, Some(reason)).await;
                if !self.voluntary {
                    self.schedule_retry();
                }
            }
            TransportEvent::Message { topic, payload } => {
                let payload = String::from_utf8_lossy(&payload).into_owned();
                let _ = self
                    .event_tx
                    .send(SessionEvent::MessageReceived { topic, payload })
                    .await;
            }
        }
    }

    /// Handles a retry-timer expiry forwarded by the dispatch loop.
    pub async fn handle_retry_elapsed(&mut self) {
        if self.voluntary || self.state != SessionState::Disconnected {
            // The chain was cancelled or a connect already won the race.
            return;
        }
        info!("retrying broker connection");
        self.connect().await;
    }

    /// Schedules the single pending retry.  A second failure while a retry
    /// is already scheduled does not create a second timer.
    fn schedule_retry(&mut self) {
        if self.retry.start(self.retry_delay) {
            debug!(delay = ?self.retry_delay, "broker retry scheduled");
        }
    }

    /// Subscribes the fixed topic set after a successful (re)connect.
    ///
    /// Per-topic failures are reported as events and logged; they never fail
    /// the session.
    async fn subscribe_topic_set(&mut self) {
        let topics = [
            self.topics.telemetry.clone(),
            self.topics.status.clone(),
            self.topics.control.clone(),
        ];
        for topic in topics {
            if let Err(e) = self.transport.subscribe(&topic, QosLevel::AtLeastOnce).await {
                warn!("auto-subscribe to {topic:?} failed: {e}");
                let _ = self
                    .event_tx
                    .send(SessionEvent::SubscribeFailed {
                        topic,
                        reason: e.to_string(),
                    })
                    .await;
            }
        }
    }

    async fn emit_status(&self, connected: bool, error: Option<String>) {
        let _ = self
            .event_tx
            .send(SessionEvent::StatusChanged { connected, error })
            .await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
