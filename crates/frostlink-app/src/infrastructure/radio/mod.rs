//! Short-range radio transport.
//!
//! Abstracts the low-energy radio used for provisioning: scanning for
//! nearby appliances, connecting, subscribing to the notification
//! characteristic, and writing credentials.  The provisioning service only
//! ever talks to [`ShortRangeTransport`]; `mock.rs` supplies the test
//! implementation.
//!
//! Scan results and characteristic notifications are push-style, so the
//! trait hands back `mpsc::Receiver`s the dispatch loop can select on.

pub mod mock;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use frostlink_core::DeviceId;

/// Error type for radio operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RadioError {
    /// The platform denied radio access.
    #[error("radio permission denied")]
    PermissionDenied,
    /// The radio is powered off or missing.
    #[error("radio unavailable: {0}")]
    Unavailable(String),
    #[error("connect to {id:?} failed: {reason}")]
    ConnectFailed { id: DeviceId, reason: String },
    #[error("characteristic write failed: {0}")]
    WriteFailed(String),
    #[error("notification monitor failed: {0}")]
    MonitorFailed(String),
}

/// One advertisement seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advert {
    pub id: DeviceId,
    /// Advertised local name, absent for anonymous adverts.
    pub name: Option<String>,
}

/// The radio side of provisioning.
#[async_trait]
pub trait ShortRangeTransport: Send {
    /// Verifies permission and adapter power before any radio use.
    async fn ensure_ready(&mut self) -> Result<(), RadioError>;

    /// Begins a scan; adverts arrive on the returned channel until
    /// [`ShortRangeTransport::stop_scan`].
    async fn start_scan(&mut self) -> Result<mpsc::Receiver<Advert>, RadioError>;

    /// Stops an in-progress scan.  Safe to call when no scan is running.
    async fn stop_scan(&mut self);

    /// Connects to a previously discovered peripheral.
    async fn connect(&mut self, id: &DeviceId) -> Result<(), RadioError>;

    /// Enumerates services and characteristics on the connected peripheral.
    /// Must complete before [`ShortRangeTransport::monitor`] or
    /// [`ShortRangeTransport::write`].
    async fn discover_capabilities(&mut self) -> Result<(), RadioError>;

    /// Subscribes to a notifying characteristic; raw notification bytes
    /// arrive on the returned channel.
    async fn monitor(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<mpsc::Receiver<Vec<u8>>, RadioError>;

    /// Writes to a characteristic and waits for the acknowledgement.
    async fn write(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
        payload: &[u8],
    ) -> Result<(), RadioError>;

    /// Drops the peripheral connection.  Safe to call when not connected.
    async fn disconnect(&mut self);
}
