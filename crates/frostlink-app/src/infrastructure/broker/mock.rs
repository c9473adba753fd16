//! Recording broker mock for tests.
//!
//! Unlike the mockall mock used for narrow expectations, this one records
//! every call in plain public fields so integration tests can drive a whole
//! session scenario and inspect the traffic afterwards.  Failure injection
//! is a matter of setting a field before the call.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{BrokerOptions, BrokerTransport, QosLevel, SessionError, TransportEvent};

/// A scriptable in-memory [`BrokerTransport`].
pub struct MockBroker {
    /// Every `connect` attempt's client id, in order.
    pub connect_attempts: Vec<String>,
    /// When set, `connect` fails with this reason.
    pub fail_connect: Option<String>,
    /// When true, every `subscribe` fails.
    pub fail_subscribe: bool,
    /// When true, every `publish` fails.
    pub fail_publish: bool,
    /// Every successful subscription.
    pub subscriptions: Vec<(String, QosLevel)>,
    /// Every successful publish, payload decoded as UTF-8.
    pub publishes: Vec<(String, String, QosLevel)>,
    pub disconnects: usize,
    event_tx: mpsc::Sender<TransportEvent>,
}

impl MockBroker {
    pub fn new() -> (Self, mpsc::Receiver<TransportEvent>) {
        let (event_tx, event_rx) = mpsc::channel(64);
        (
            Self {
                connect_attempts: Vec::new(),
                fail_connect: None,
                fail_subscribe: false,
                fail_publish: false,
                subscriptions: Vec::new(),
                publishes: Vec::new(),
                disconnects: 0,
                event_tx,
            },
            event_rx,
        )
    }

    /// A sender tests use to inject broker-side events (inbound messages,
    /// connection drops).
    pub fn injector(&self) -> mpsc::Sender<TransportEvent> {
        self.event_tx.clone()
    }
}

#[async_trait]
impl BrokerTransport for MockBroker {
    async fn connect(&mut self, opts: &BrokerOptions) -> Result<(), SessionError> {
        self.connect_attempts.push(opts.client_id.clone());
        match &self.fail_connect {
            Some(reason) => Err(SessionError::ConnectionFailed(reason.clone())),
            None => Ok(()),
        }
    }

    async fn disconnect(&mut self) {
        self.disconnects += 1;
    }

    async fn subscribe(&mut self, topic: &str, qos: QosLevel) -> Result<(), SessionError> {
        if self.fail_subscribe {
            return Err(SessionError::SubscribeFailed {
                topic: topic.to_string(),
                reason: "injected subscribe failure".to_string(),
            });
        }
        self.subscriptions.push((topic.to_string(), qos));
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QosLevel,
    ) -> Result<(), SessionError> {
        if self.fail_publish {
            return Err(SessionError::PublishFailed {
                topic: topic.to_string(),
                reason: "injected publish failure".to_string(),
            });
        }
        self.publishes.push((
            topic.to_string(),
            String::from_utf8_lossy(payload).into_owned(),
            qos,
        ));
        Ok(())
    }
}
