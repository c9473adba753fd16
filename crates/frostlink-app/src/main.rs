//! Frostlink binary: broker-side connectivity daemon.
//!
//! Wires the rumqttc transport, broker session, and device monitor together
//! and runs the dispatch loop until Ctrl-C.  Provisioning runs against the
//! short-range radio binding of the host platform and is exercised through
//! the library API.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use frostlink_app::application::monitor::DeviceMonitor;
use frostlink_app::infrastructure::broker::rumqttc::RumqttcTransport;
use frostlink_app::infrastructure::broker::{BrokerOptions, BrokerSession, TopicSet};
use frostlink_app::infrastructure::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("frostlink.toml"));
    let config = AppConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let topics = TopicSet {
        telemetry: config.topics.telemetry.clone(),
        status: config.topics.status.clone(),
        control: config.topics.control.clone(),
    };
    let opts = BrokerOptions {
        url: config.broker.url.clone(),
        client_id: config.effective_client_id(),
        username: config.broker.username.clone(),
        password: config.broker.password.clone(),
        keep_alive: Duration::from_secs(config.broker.keep_alive_secs),
    };

    let (transport, mut transport_rx) = RumqttcTransport::new();
    let (mut session, mut session_rx, mut retry_rx) = BrokerSession::new(
        transport,
        opts,
        topics.clone(),
        Duration::from_secs(config.broker.retry_delay_secs),
    );
    let (mut monitor, mut monitor_rx, mut tick_rx) = DeviceMonitor::new(
        topics,
        config.liveness.window_ticks,
        Duration::from_secs(config.liveness.tick_interval_secs),
    );

    info!(url = %config.broker.url, "frostlink starting");
    session.connect().await;

    loop {
        tokio::select! {
            Some(event) = transport_rx.recv() => {
                session.handle_transport_event(event).await;
            }
            Some(event) = session_rx.recv() => {
                use frostlink_app::infrastructure::broker::SessionEvent;
                match event {
                    SessionEvent::MessageReceived { topic, payload } => {
                        monitor.handle_message(&topic, &payload).await;
                    }
                    SessionEvent::StatusChanged { connected, error } => {
                        match error {
                            Some(reason) => warn!(connected, %reason, "broker status changed"),
                            None => info!(connected, "broker status changed"),
                        }
                    }
                    SessionEvent::SubscribeFailed { topic, reason } => {
                        error!(%topic, %reason, "subscription failed");
                    }
                }
            }
            Some(()) = retry_rx.recv() => {
                session.handle_retry_elapsed().await;
            }
            Some(()) = tick_rx.recv() => {
                monitor.handle_tick().await;
            }
            Some(event) = monitor_rx.recv() => {
                use frostlink_app::application::monitor::MonitorEvent;
                match event {
                    MonitorEvent::TemperatureUpdated(value) => info!(value, "temperature"),
                    MonitorEvent::CoolingChanged(active) => info!(active, "cooling"),
                    MonitorEvent::LivenessChanged(active) => info!(active, "device liveness"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    // Ticker first so no expiry fires mid-teardown, then the session, which
    // also cancels any pending retry.
    monitor.stop();
    session.disconnect().await;
    Ok(())
}
