//! Owned timer handles: one-shot delays and repeating tickers.
//!
//! Every logical timer in the system (reconnect backoff, scan timeout,
//! liveness countdown) is an explicit owned handle with `start` / `stop` /
//! `is_running`.  The handles enforce the idempotence the rest of the system
//! relies on:
//!
//! - starting a timer that is already running is a no-op — two rapid
//!   failures never produce two pending retries;
//! - stopping a stopped timer is a no-op — teardown paths can always call
//!   `cancel` unconditionally.
//!
//! Expiry is delivered on an `mpsc` channel rather than in a callback so the
//! owning component handles it from the same dispatch loop as every other
//! event, keeping all state transitions serialized.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// A single-shot delay timer.
///
/// At most one delay is pending at any instant.  When the delay elapses, one
/// `()` is sent on the receiver returned by [`OneShotTimer::new`].
pub struct OneShotTimer {
    name: &'static str,
    fire_tx: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl OneShotTimer {
    /// Creates a stopped timer and the channel its expiries arrive on.
    pub fn new(name: &'static str) -> (Self, mpsc::Receiver<()>) {
        let (fire_tx, fire_rx) = mpsc::channel(1);
        (
            Self {
                name,
                fire_tx,
                handle: None,
            },
            fire_rx,
        )
    }

    /// Schedules the timer.  Returns `false` (without rescheduling) if a
    /// delay is already pending.
    pub fn start(&mut self, delay: Duration) -> bool {
        if self.is_running() {
            trace!(timer = self.name, "start ignored; already pending");
            return false;
        }
        let tx = self.fire_tx.clone();
        let name = self.name;
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trace!(timer = name, "fired");
            let _ = tx.send(()).await;
        }));
        true
    }

    /// Cancels the pending delay, if any.  Safe to call repeatedly.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Whether a delay is currently pending.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

/// A repeating ticker.
///
/// Sends one `()` per period on the receiver returned by
/// [`IntervalTimer::new`].  The first tick arrives one full period after
/// `start`, not immediately.
pub struct IntervalTimer {
    name: &'static str,
    tick_tx: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl IntervalTimer {
    /// Creates a stopped ticker and the channel its ticks arrive on.
    pub fn new(name: &'static str) -> (Self, mpsc::Receiver<()>) {
        let (tick_tx, tick_rx) = mpsc::channel(4);
        (
            Self {
                name,
                tick_tx,
                handle: None,
            },
            tick_rx,
        )
    }

    /// Starts ticking.  Returns `false` (leaving the running ticker alone)
    /// if the ticker is already running — never two concurrent tickers for
    /// the same logical timer.
    pub fn start(&mut self, period: Duration) -> bool {
        if self.is_running() {
            return false;
        }
        let tx = self.tick_tx.clone();
        let name = self.name;
        self.handle = Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                trace!(timer = name, "tick");
                if tx.send(()).await.is_err() {
                    // Receiver dropped – owner is shutting down.
                    break;
                }
            }
        }));
        true
    }

    /// Stops ticking.  Safe to call on an already-stopped ticker.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Whether the ticker is currently running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_fires_once_after_delay() {
        let (mut timer, mut fire_rx) = OneShotTimer::new("test");
        assert!(timer.start(Duration::from_secs(5)));

        // Paused time auto-advances to the sleep deadline.
        fire_rx.recv().await.expect("timer must fire");
        assert!(fire_rx.try_recv().is_err(), "must fire exactly once");
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_start_while_pending_is_noop() {
        let (mut timer, mut fire_rx) = OneShotTimer::new("test");
        assert!(timer.start(Duration::from_secs(5)));
        assert!(!timer.start(Duration::from_secs(5)));
        assert!(!timer.start(Duration::from_secs(1)));

        fire_rx.recv().await.expect("timer must fire");

        // Only the original delay was pending; no stacked fires.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(fire_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_cancel_prevents_fire_and_is_idempotent() {
        let (mut timer, mut fire_rx) = OneShotTimer::new("test");
        timer.start(Duration::from_secs(5));
        timer.cancel();
        timer.cancel();
        assert!(!timer.is_running());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(fire_rx.try_recv().is_err(), "cancelled timer must not fire");
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_restartable_after_fire() {
        let (mut timer, mut fire_rx) = OneShotTimer::new("test");
        timer.start(Duration::from_secs(1));
        fire_rx.recv().await.unwrap();

        assert!(timer.start(Duration::from_secs(1)), "must be restartable");
        fire_rx.recv().await.expect("second delay must fire");
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_ticks_repeatedly() {
        let (mut ticker, mut tick_rx) = IntervalTimer::new("test");
        ticker.start(Duration::from_secs(1));

        for _ in 0..3 {
            tick_rx.recv().await.expect("tick");
        }
        ticker.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_start_while_running_is_noop() {
        let (mut ticker, mut tick_rx) = IntervalTimer::new("test");
        assert!(ticker.start(Duration::from_secs(1)));
        assert!(!ticker.start(Duration::from_secs(1)));

        // One ticker only: exactly one tick per second, not two.
        tick_rx.recv().await.unwrap();
        assert!(
            tick_rx.try_recv().is_err(),
            "a second concurrent ticker must not exist"
        );
        ticker.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_stop_is_idempotent() {
        let (mut ticker, mut tick_rx) = IntervalTimer::new("test");
        ticker.stop();
        ticker.start(Duration::from_secs(1));
        ticker.stop();
        ticker.stop();
        assert!(!ticker.is_running());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(tick_rx.try_recv().is_err(), "stopped ticker must not tick");
    }
}
