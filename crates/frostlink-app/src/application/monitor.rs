//! Device monitor: telemetry cache and liveness inference.
//!
//! The appliance never publishes an explicit heartbeat, so aliveness is
//! inferred from message cadence: any message on a watched topic refills a
//! countdown window, and a 1 s ticker drains it.  When the window empties
//! the device is declared inactive and the cached telemetry is cleared, so
//! observers never act on stale readings.
//!
//! # Architecture
//!
//! ```text
//! SessionEvent::MessageReceived ──► handle_message()
//!                                      │ reset window, update snapshot
//!                                      ▼
//!                                LivenessWindow ◄── handle_tick() ◄── IntervalTimer
//!                                      │ Expired
//!                                      ▼
//!                     clear snapshot, stop ticker, LivenessChanged(false)
//! ```
//!
//! The window resets on every watched message, valid payload or not: a
//! garbled reading still proves the device is transmitting.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use frostlink_core::{parse_flag, parse_temperature, LivenessWindow, Tick};

use crate::infrastructure::broker::TopicSet;
use crate::infrastructure::timer::IntervalTimer;

/// Last known appliance readings.  Cleared whenever liveness expires.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub temperature: Option<f64>,
    pub cooling_active: bool,
}

/// Events the monitor emits to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    TemperatureUpdated(f64),
    CoolingChanged(bool),
    /// Inactive→active or active→inactive transition.  Not emitted for
    /// resets while already active.
    LivenessChanged(bool),
}

/// Tracks one appliance's liveness and telemetry.
pub struct DeviceMonitor {
    topics: TopicSet,
    window: LivenessWindow,
    ticker: IntervalTimer,
    tick_interval: Duration,
    snapshot: TelemetrySnapshot,
    event_tx: mpsc::Sender<MonitorEvent>,
}

impl DeviceMonitor {
    /// Creates an inactive monitor.
    ///
    /// Returns the monitor, its event receiver, and the ticker receiver the
    /// dispatch loop must forward into [`DeviceMonitor::handle_tick`].
    pub fn new(
        topics: TopicSet,
        window_ticks: u32,
        tick_interval: Duration,
    ) -> (Self, mpsc::Receiver<MonitorEvent>, mpsc::Receiver<()>) {
        let (event_tx, event_rx) = mpsc::channel(64);
        let (ticker, tick_rx) = IntervalTimer::new("liveness-tick");
        let monitor = Self {
            topics,
            window: LivenessWindow::new(window_ticks),
            ticker,
            tick_interval,
            snapshot: TelemetrySnapshot::default(),
            event_tx,
        };
        (monitor, event_rx, tick_rx)
    }

    pub fn is_active(&self) -> bool {
        self.window.is_active()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.snapshot
    }

    /// Routes one inbound broker message.
    ///
    /// Only the telemetry and status topics are liveness evidence.  The
    /// control topic is not: the appliance never publishes there, so a
    /// message on it is our own command echoed back by the broker.
    pub async fn handle_message(&mut self, topic: &str, payload: &str) {
        if topic == self.topics.telemetry {
            match parse_temperature(payload) {
                Some(value) => {
                    self.snapshot.temperature = Some(value);
                    let _ = self.event_tx.send(MonitorEvent::TemperatureUpdated(value)).await;
                }
                None => {
                    warn!(payload, "unparseable temperature reading");
                }
            }
            self.reset_window().await;
        } else if topic == self.topics.status {
            let active = parse_flag(payload);
            if self.snapshot.cooling_active != active {
                self.snapshot.cooling_active = active;
                let _ = self.event_tx.send(MonitorEvent::CoolingChanged(active)).await;
            }
            self.reset_window().await;
        } else {
            // Includes the control topic: it is write-only from this side,
            // and the broker echoes our own publishes back to us.  An echo
            // proves nothing about the appliance.
            debug!(topic, "message carries no liveness signal");
        }
    }

    /// Handles a ticker expiry forwarded by the dispatch loop.
    pub async fn handle_tick(&mut self) {
        match self.window.tick() {
            Tick::Active { remaining } => {
                debug!(remaining, "liveness window draining");
            }
            Tick::Expired => {
                info!("device went silent, declaring inactive");
                self.snapshot = TelemetrySnapshot::default();
                self.ticker.stop();
                let _ = self.event_tx.send(MonitorEvent::LivenessChanged(false)).await;
            }
            Tick::Idle => {}
        }
    }

    /// Overwrites the cached cooling flag without a liveness signal.  Used
    /// by the control path for its optimistic update.
    pub fn set_cooling(&mut self, active: bool) {
        self.snapshot.cooling_active = active;
    }

    /// Stops the ticker.  Part of orderly shutdown.
    pub fn stop(&mut self) {
        self.ticker.stop();
    }

    async fn reset_window(&mut self) {
        let was_active = self.window.is_active();
        self.window.reset();
        if !self.ticker.is_running() {
            self.ticker.start(self.tick_interval);
        }
        if !was_active {
            let _ = self.event_tx.send(MonitorEvent::LivenessChanged(true)).await;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn topic_set() -> TopicSet {
        TopicSet {
            telemetry: "Temp".to_string(),
            status: "Estado".to_string(),
            control: "Control".to_string(),
        }
    }

    fn monitor() -> (DeviceMonitor, mpsc::Receiver<MonitorEvent>, mpsc::Receiver<()>) {
        DeviceMonitor::new(topic_set(), 20, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_telemetry_message_updates_snapshot_and_activates() {
        let (mut monitor, mut events, _ticks) = monitor();

        monitor.handle_message("Temp", "4.5").await;

        assert!(monitor.is_active());
        assert_eq!(monitor.snapshot().temperature, Some(4.5));
        assert_eq!(events.recv().await, Some(MonitorEvent::TemperatureUpdated(4.5)));
        assert_eq!(events.recv().await, Some(MonitorEvent::LivenessChanged(true)));
    }

    #[tokio::test]
    async fn test_garbled_telemetry_still_resets_liveness() {
        let (mut monitor, mut events, _ticks) = monitor();

        monitor.handle_message("Temp", "banana").await;

        // No reading cached, but the device clearly transmitted.
        assert!(monitor.is_active());
        assert_eq!(monitor.snapshot().temperature, None);
        assert_eq!(events.recv().await, Some(MonitorEvent::LivenessChanged(true)));
    }

    #[tokio::test]
    async fn test_status_flag_toggles_cooling() {
        let (mut monitor, mut events, _ticks) = monitor();

        monitor.handle_message("Estado", "1").await;
        assert!(monitor.snapshot().cooling_active);
        assert_eq!(events.recv().await, Some(MonitorEvent::CoolingChanged(true)));

        monitor.handle_message("Estado", "0").await;
        assert!(!monitor.snapshot().cooling_active);
    }

    #[tokio::test]
    async fn test_control_echo_is_not_liveness_evidence() {
        let (mut monitor, mut events, _ticks) = monitor();

        // The broker echoes our own command back; a dead appliance must not
        // look alive because we pressed a button.
        monitor.handle_message("Control", "1").await;

        assert!(!monitor.is_active());
        assert!(!monitor.snapshot().cooling_active, "Estado alone owns the flag");
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unwatched_topic_carries_no_liveness_signal() {
        let (mut monitor, _events, _ticks) = monitor();

        monitor.handle_message("Other", "1").await;

        assert!(!monitor.is_active());
    }

    #[tokio::test]
    async fn test_window_expiry_clears_snapshot() {
        let (mut monitor, mut events, _ticks) = monitor();

        monitor.handle_message("Temp", "3.2").await;
        monitor.handle_message("Estado", "1").await;

        // Drain the whole window without fresh traffic.
        for _ in 0..20 {
            monitor.handle_tick().await;
        }

        assert!(!monitor.is_active());
        assert_eq!(monitor.snapshot(), TelemetrySnapshot::default());

        // Events: TemperatureUpdated, LivenessChanged(true), CoolingChanged,
        // then the expiry.
        let mut last = None;
        while let Ok(event) = events.try_recv() {
            last = Some(event);
        }
        assert_eq!(last, Some(MonitorEvent::LivenessChanged(false)));
    }

    #[tokio::test]
    async fn test_fresh_message_refills_a_draining_window() {
        let (mut monitor, _events, _ticks) = monitor();

        monitor.handle_message("Temp", "3.2").await;
        for _ in 0..19 {
            monitor.handle_tick().await;
        }
        assert!(monitor.is_active(), "one tick of headroom left");

        monitor.handle_message("Temp", "3.3").await;
        for _ in 0..19 {
            monitor.handle_tick().await;
        }
        assert!(monitor.is_active(), "window was refilled to 20");
    }

    #[tokio::test]
    async fn test_tick_while_idle_is_a_noop() {
        let (mut monitor, mut events, _ticks) = monitor();

        monitor.handle_tick().await;

        assert!(!monitor.is_active());
        assert!(events.try_recv().is_err(), "no events while idle");
    }
}
