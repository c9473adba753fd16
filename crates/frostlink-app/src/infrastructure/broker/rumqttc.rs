//! MQTT transport over rumqttc.
//!
//! Wraps `rumqttc::AsyncClient` behind [`BrokerTransport`].  A successful
//! `connect` means a `ConnAck` was received; after that a background task
//! keeps polling the event loop, forwarding inbound publishes and the first
//! poll error (the event loop is not polled again after an error, the
//! session layer owns the retry).

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{BrokerOptions, BrokerTransport, QosLevel, SessionError, TransportEvent};

/// How long we wait for the broker's `ConnAck` before declaring the attempt
/// failed.
const CONNACK_TIMEOUT: Duration = Duration::from_secs(10);

const fn to_qos(qos: QosLevel) -> QoS {
    match qos {
        QosLevel::AtMostOnce => QoS::AtMostOnce,
        QosLevel::AtLeastOnce => QoS::AtLeastOnce,
    }
}

/// Splits `url` into `(host, port)`, tolerating a scheme prefix and
/// defaulting the port to 1883.
fn parse_url(url: &str) -> (String, u16) {
    let trimmed = match url.split_once("://") {
        Some((_, rest)) => rest,
        None => url,
    };
    match trimmed.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host.to_string(), port),
            // Garbage after the colon: keep the host, default the port.
            Err(_) => (host.to_string(), 1883),
        },
        None => (trimmed.to_string(), 1883),
    }
}

/// The production [`BrokerTransport`] implementation.
pub struct RumqttcTransport {
    client: Option<AsyncClient>,
    poll_task: Option<JoinHandle<()>>,
    event_tx: mpsc::Sender<TransportEvent>,
}

impl RumqttcTransport {
    /// Creates the transport and the channel its events arrive on.
    pub fn new() -> (Self, mpsc::Receiver<TransportEvent>) {
        let (event_tx, event_rx) = mpsc::channel(64);
        (
            Self {
                client: None,
                poll_task: None,
                event_tx,
            },
            event_rx,
        )
    }

    fn teardown(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
        self.client = None;
    }
}

#[async_trait]
impl BrokerTransport for RumqttcTransport {
    async fn connect(&mut self, opts: &BrokerOptions) -> Result<(), SessionError> {
        // A fresh attempt always starts from a clean slate.
        self.teardown();

        let (host, port) = parse_url(&opts.url);
        let mut mqtt_opts = MqttOptions::new(&opts.client_id, host, port);
        mqtt_opts.set_keep_alive(opts.keep_alive);
        if !opts.username.is_empty() {
            mqtt_opts.set_credentials(&opts.username, &opts.password);
        }

        let (client, mut event_loop) = AsyncClient::new(mqtt_opts, 16);

        // Poll until the broker acknowledges the session.
        let deadline = tokio::time::Instant::now() + CONNACK_TIMEOUT;
        loop {
            let event = tokio::time::timeout_at(deadline, event_loop.poll())
                .await
                .map_err(|_| SessionError::ConnectionFailed("timed out waiting for broker acknowledgement".to_string()))?;
            match event {
                Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                    debug!(?ack.code, "broker acknowledged session");
                    break;
                }
                Ok(other) => {
                    debug!(?other, "pre-acknowledgement event");
                }
                Err(e) => {
                    return Err(SessionError::ConnectionFailed(e.to_string()));
                }
            }
        }

        // Hand the event loop to a background task that forwards traffic.
        let event_tx = self.event_tx.clone();
        let task = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Incoming::Publish(publish))) => {
                        let _ = event_tx
                            .send(TransportEvent::Message {
                                topic: publish.topic.clone(),
                                payload: publish.payload.to_vec(),
                            })
                            .await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("broker event loop error: {e}");
                        let _ = event_tx
                            .send(TransportEvent::ConnectionStatus {
                                connected: false,
                                error: Some(e.to_string()),
                            })
                            .await;
                        // The session layer decides whether to reconnect.
                        break;
                    }
                }
            }
        });

        self.client = Some(client);
        self.poll_task = Some(task);
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(client) = self.client.clone() {
            // Best effort; the link may already be gone.
            let _ = client.disconnect().await;
        }
        self.teardown();
    }

    async fn subscribe(&mut self, topic: &str, qos: QosLevel) -> Result<(), SessionError> {
        let client = self.client.as_ref().ok_or(SessionError::NotConnected)?;
        client
            .subscribe(topic, to_qos(qos))
            .await
            .map_err(|e| SessionError::SubscribeFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QosLevel,
    ) -> Result<(), SessionError> {
        let client = self.client.as_ref().ok_or(SessionError::NotConnected)?;
        client
            .publish(topic, to_qos(qos), false, payload)
            .await
            .map_err(|e| SessionError::PublishFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
