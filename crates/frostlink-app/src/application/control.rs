//! Cooling control commands.
//!
//! One command today: toggle the compressor.  The command is gated on both
//! the broker session and the device's liveness, so a press against a dead
//! appliance is rejected instead of silently queued.  The cached flag flips
//! optimistically before the publish and is reverted if the publish fails;
//! the appliance's own echo on the status topic remains the authority.

use thiserror::Error;
use tracing::info;

use frostlink_core::encode_flag;

use crate::application::monitor::DeviceMonitor;
use crate::infrastructure::broker::{BrokerSession, BrokerTransport, QosLevel};

/// Error type for control commands.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    /// No broker session.
    #[error("control requires a connected broker session")]
    NotConnected,
    /// The session is up but the appliance has gone silent.
    #[error("device is not reporting; command rejected")]
    DeviceInactive,
    #[error("command publish failed: {0}")]
    Publish(String),
}

/// Publishes cooling commands for one appliance.
pub struct CoolingControl {
    topic: String,
}

impl CoolingControl {
    pub fn new(topic: String) -> Self {
        Self { topic }
    }

    /// Flips the compressor state and returns the newly requested state.
    ///
    /// Fire-and-forget publish: the firmware treats the control topic as an
    /// edge trigger and acknowledges on the status topic.
    ///
    /// # Errors
    ///
    /// [`ControlError::NotConnected`] without a session,
    /// [`ControlError::DeviceInactive`] when liveness has expired.  Neither
    /// case publishes anything.
    pub async fn toggle<T: BrokerTransport>(
        &self,
        session: &mut BrokerSession<T>,
        monitor: &mut DeviceMonitor,
    ) -> Result<bool, ControlError> {
        if !session.is_connected() {
            return Err(ControlError::NotConnected);
        }
        if !monitor.is_active() {
            return Err(ControlError::DeviceInactive);
        }

        let desired = !monitor.snapshot().cooling_active;
        // Optimistic: observers see the new state immediately; the status
        // echo confirms or corrects it.
        monitor.set_cooling(desired);

        let payload = encode_flag(desired);
        if let Err(e) = session
            .publish(&self.topic, payload.as_bytes(), QosLevel::AtMostOnce)
            .await
        {
            monitor.set_cooling(!desired);
            return Err(ControlError::Publish(e.to_string()));
        }

        info!(desired, "cooling command published");
        Ok(desired)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
