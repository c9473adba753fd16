//! LivenessWindow: countdown arithmetic for "is the appliance reporting?".
//!
//! The broker session being connected does not imply the appliance is alive —
//! it may be powered off while the session itself stays up.  Liveness is
//! therefore inferred from message cadence: every inbound telemetry or status
//! message refills a countdown window, and silence drains it one tick at a
//! time until the appliance is declared inactive.
//!
//! This type holds only the arithmetic.  The ticking itself (one decrement
//! per second) is driven by the application's interval timer so that the
//! state transition stays inside the single dispatch loop.

/// Outcome of one timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Still counting down; `remaining` ticks left before expiry.
    Active { remaining: u32 },
    /// This tick drained the window: the appliance just became inactive.
    Expired,
    /// The window was already empty; nothing changed.
    Idle,
}

/// Per-relationship countdown window.
///
/// `active` is true iff `remaining > 0`.  Reaching zero is a one-way
/// transition per fill: the caller must observe [`Tick::Expired`] and clear
/// any cached telemetry — stale readings are treated as worse than none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivenessWindow {
    window: u32,
    remaining: u32,
}

impl LivenessWindow {
    /// Creates an *inactive* window that refills to `window` ticks on reset.
    pub fn new(window: u32) -> Self {
        Self {
            window,
            remaining: 0,
        }
    }

    /// Refills the window to its full tick count.
    pub fn reset(&mut self) {
        self.remaining = self.window;
    }

    /// Consumes one tick.
    pub fn tick(&mut self) -> Tick {
        match self.remaining {
            0 => Tick::Idle,
            1 => {
                self.remaining = 0;
                Tick::Expired
            }
            _ => {
                self.remaining -= 1;
                Tick::Active {
                    remaining: self.remaining,
                }
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_window_starts_inactive() {
        let window = LivenessWindow::new(20);
        assert!(!window.is_active());
        assert_eq!(window.remaining(), 0);
    }

    #[test]
    fn test_reset_fills_window_and_activates() {
        let mut window = LivenessWindow::new(20);
        window.reset();
        assert!(window.is_active());
        assert_eq!(window.remaining(), 20);
    }

    #[test]
    fn test_expires_after_exactly_window_ticks() {
        let mut window = LivenessWindow::new(3);
        window.reset();

        assert_eq!(window.tick(), Tick::Active { remaining: 2 });
        assert_eq!(window.tick(), Tick::Active { remaining: 1 });
        assert_eq!(window.tick(), Tick::Expired);
        assert!(!window.is_active());
    }

    #[test]
    fn test_tick_on_empty_window_is_idle() {
        let mut window = LivenessWindow::new(3);
        assert_eq!(window.tick(), Tick::Idle);
        assert_eq!(window.tick(), Tick::Idle);
    }

    #[test]
    fn test_reset_between_ticks_prevents_expiry() {
        let mut window = LivenessWindow::new(2);
        window.reset();

        // Resets spaced closer than the window keep the appliance active
        // no matter how long the sequence runs.
        for _ in 0..50 {
            assert_ne!(window.tick(), Tick::Expired);
            window.reset();
        }
        assert!(window.is_active());
    }

    #[test]
    fn test_reset_after_expiry_reactivates_with_full_window() {
        let mut window = LivenessWindow::new(2);
        window.reset();
        window.tick();
        assert_eq!(window.tick(), Tick::Expired);

        window.reset();
        assert!(window.is_active());
        assert_eq!(window.remaining(), 2);
    }
}
