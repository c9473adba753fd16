//! Provisioning: scan, bind, credential push, record assembly.
//!
//! Walks an unprovisioned appliance from advert to registry record:
//!
//! ```text
//!         toggle_scan()          connect_device()       monitor() ok
//! Idle ───────────────► Scanning ─────────► Connecting ─────────► Bound
//!   ▲                      │                                        │
//!   │   timeout / toggle   │                     send_credentials() │
//!   ├──────────────────────┘                                        ▼
//!   │                                                          AwaitingIp
//!   │   Error frame / peripheral drop / cancel()                    │
//!   ◄──────────────────────────────────────────────────    IP frame │
//!   ▲                                                               ▼
//!   └───────────────────────────────────────────────────────────  Ready
//! ```
//!
//! After credentials are written the appliance answers with a stream of
//! `FIELD:value` frames in arbitrary order.  The `IP` frame alone promotes
//! the device into the registry; fields that arrive before it wait in a
//! scratch buffer, fields after it enrich the record directly.  An `Error`
//! frame aborts the attempt and leaves the registry untouched.
//!
//! # State machine notes (for beginners)
//!
//! Every transition happens inside a `&mut self` method called from the one
//! dispatch loop, so there is no state to lock and no transition can be
//! observed half-done.  The scan timeout is an [`OneShotTimer`] owned by
//! this service; the loop forwards its expiry into
//! [`ProvisioningService::handle_scan_timeout`].

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use frostlink_core::protocol::{
    CREDENTIAL_CHARACTERISTIC, CREDENTIAL_SERVICE, PROVISION_CHARACTERISTIC, PROVISION_SERVICE,
};
use frostlink_core::{
    parse_notification, ConnectedDevice, DeviceId, DeviceRegistry, DiscoveredDevice, Fragment,
};

use crate::infrastructure::radio::{Advert, RadioError, ShortRangeTransport};
use crate::infrastructure::timer::OneShotTimer;

/// Error type for provisioning operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProvisionError {
    /// The operation requires a bound peripheral.
    #[error("no peripheral is bound")]
    NotConnected,
    /// A connection attempt is already in progress or bound.
    #[error("a provisioning attempt is already in progress")]
    Busy,
    /// Credentials were rejected before any write.
    #[error("network name and passphrase must both be non-empty")]
    Validation,
    /// The appliance reported a provisioning failure.
    #[error("appliance aborted provisioning: {0}")]
    Aborted(String),
    /// The first credential write failed; nothing reached the appliance.
    #[error("credential write failed: {0}")]
    WriteFailed(String),
    /// The second write failed after the first succeeded.  The appliance
    /// holds a network name with no passphrase.
    #[error("passphrase write failed after network name was delivered: {0}")]
    PartialWrite(String),
    /// The id is not in the discovered set.
    #[error("unknown device: {0}")]
    UnknownDevice(String),
    #[error(transparent)]
    Radio(#[from] RadioError),
}

/// Where the provisioning attempt currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionState {
    Idle,
    Scanning,
    /// Radio connect and capability discovery in flight.
    Connecting(DeviceId),
    /// Peripheral connected, notifications flowing, no credentials sent.
    Bound(DeviceId),
    /// Credentials delivered; waiting for the `IP` frame.
    AwaitingIp(DeviceId),
    /// The appliance reported its address and is in the registry.
    Ready(DeviceId),
}

/// Events the provisioning service emits to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningEvent {
    ScanStarted,
    ScanFinished,
    DeviceDiscovered(DiscoveredDevice),
    DeviceBound(DeviceId),
    /// The appliance reported its address and entered the registry.
    Promoted { id: DeviceId, ip: String },
    /// The appliance rejected the credentials; message verbatim.
    Aborted { id: DeviceId, message: String },
    /// The peripheral link dropped mid-attempt.
    Disconnected(DeviceId),
}

/// Credential fields that arrived before the promoting `IP` frame.
#[derive(Debug, Default, Clone)]
struct FieldBuffer {
    port: Option<String>,
    user: Option<String>,
    password: Option<String>,
    client_id: Option<String>,
}

/// Drives one provisioning attempt at a time over a [`ShortRangeTransport`].
pub struct ProvisioningService<R: ShortRangeTransport> {
    radio: R,
    state: ProvisionState,
    name_prefix: String,
    scan_timeout: Duration,
    scan_timer: OneShotTimer,
    /// Advertised name of the peripheral being provisioned, captured at
    /// connect time for the eventual registry record.
    pending_name: Option<String>,
    buffer: FieldBuffer,
    event_tx: mpsc::Sender<ProvisioningEvent>,
}

impl<R: ShortRangeTransport> ProvisioningService<R> {
    /// Creates an idle service.
    ///
    /// Returns the service, its event receiver, and the scan-timeout
    /// receiver the dispatch loop must forward into
    /// [`ProvisioningService::handle_scan_timeout`].
    pub fn new(
        radio: R,
        name_prefix: String,
        scan_timeout: Duration,
    ) -> (
        Self,
        mpsc::Receiver<ProvisioningEvent>,
        mpsc::Receiver<()>,
    ) {
        let (event_tx, event_rx) = mpsc::channel(64);
        let (scan_timer, scan_rx) = OneShotTimer::new("scan-timeout");
        let service = Self {
            radio,
            state: ProvisionState::Idle,
            name_prefix,
            scan_timeout,
            scan_timer,
            pending_name: None,
            buffer: FieldBuffer::default(),
            event_tx,
        };
        (service, event_rx, scan_rx)
    }

    pub fn state(&self) -> &ProvisionState {
        &self.state
    }

    /// Radio access for tests that inspect the recording mock.
    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Starts a scan, or stops the one in progress.
    ///
    /// Starting verifies the radio first and prunes stale adverts, then
    /// arms the timeout.  Stopping discards everything the scan found.
    /// Returns the advert receiver when a scan started, `None` when one was
    /// stopped.
    pub async fn toggle_scan(
        &mut self,
        registry: &mut DeviceRegistry,
    ) -> Result<Option<mpsc::Receiver<Advert>>, ProvisionError> {
        match self.state {
            ProvisionState::Scanning => {
                self.finish_scan(registry).await;
                Ok(None)
            }
            ProvisionState::Idle => {
                self.radio.ensure_ready().await?;
                registry.prune_discovered();
                let adverts = self.radio.start_scan().await?;
                self.scan_timer.start(self.scan_timeout);
                self.state = ProvisionState::Scanning;
                info!(timeout = ?self.scan_timeout, "scan started");
                let _ = self.event_tx.send(ProvisioningEvent::ScanStarted).await;
                Ok(Some(adverts))
            }
            _ => Err(ProvisionError::Busy),
        }
    }

    /// Filters one advert into the discovered set.
    ///
    /// Anonymous adverts and names outside the appliance prefix are dropped
    /// silently; a scan sees every radio in range.
    pub async fn handle_scan_result(&mut self, advert: Advert, registry: &mut DeviceRegistry) {
        if self.state != ProvisionState::Scanning {
            return;
        }
        let Some(name) = advert.name else {
            return;
        };
        if !name.starts_with(&self.name_prefix) {
            return;
        }
        let device = DiscoveredDevice {
            id: advert.id,
            name,
        };
        if registry.add_discovered(device.clone()) {
            debug!(id = %device.id, name = %device.name, "appliance discovered");
            let _ = self
                .event_tx
                .send(ProvisioningEvent::DeviceDiscovered(device))
                .await;
        }
    }

    /// Handles a scan-timeout expiry forwarded by the dispatch loop.
    pub async fn handle_scan_timeout(&mut self, registry: &mut DeviceRegistry) {
        if self.state != ProvisionState::Scanning {
            return;
        }
        info!("scan timed out");
        self.finish_scan(registry).await;
    }

    /// Connects to a discovered appliance and opens its notification stream.
    ///
    /// Allowed from `Idle` and `Scanning` (an in-progress scan is stopped
    /// first).  Returns the notification receiver the dispatch loop must
    /// forward into [`ProvisioningService::handle_notification`].
    ///
    /// # Errors
    ///
    /// [`ProvisionError::Busy`] when an attempt is already past scanning,
    /// [`ProvisionError::UnknownDevice`] when the id was never discovered,
    /// and any [`RadioError`] from the transport.
    pub async fn connect_device(
        &mut self,
        id: &DeviceId,
        registry: &mut DeviceRegistry,
    ) -> Result<mpsc::Receiver<Vec<u8>>, ProvisionError> {
        match self.state {
            ProvisionState::Idle | ProvisionState::Scanning => {}
            _ => return Err(ProvisionError::Busy),
        }

        let name = registry
            .discovered()
            .iter()
            .find(|d| &d.id == id)
            .map(|d| d.name.clone())
            .ok_or_else(|| ProvisionError::UnknownDevice(id.clone()))?;

        if self.state == ProvisionState::Scanning {
            self.scan_timer.cancel();
            self.radio.stop_scan().await;
        }
        // The attempt consumes the scan session either way.
        registry.clear_discovered();

        self.state = ProvisionState::Connecting(id.clone());
        if let Err(e) = self.radio.ensure_ready().await {
            self.state = ProvisionState::Idle;
            return Err(e.into());
        }
        if let Err(e) = self.radio.connect(id).await {
            self.state = ProvisionState::Idle;
            return Err(e.into());
        }
        if let Err(e) = self.radio.discover_capabilities().await {
            self.radio.disconnect().await;
            self.state = ProvisionState::Idle;
            return Err(e.into());
        }
        let notifications = match self
            .radio
            .monitor(PROVISION_SERVICE, PROVISION_CHARACTERISTIC)
            .await
        {
            Ok(rx) => rx,
            Err(e) => {
                self.radio.disconnect().await;
                self.state = ProvisionState::Idle;
                return Err(e.into());
            }
        };

        self.pending_name = Some(name);
        self.buffer = FieldBuffer::default();
        self.state = ProvisionState::Bound(id.clone());
        info!(%id, "peripheral bound");
        let _ = self
            .event_tx
            .send(ProvisioningEvent::DeviceBound(id.clone()))
            .await;
        Ok(notifications)
    }

    /// Pushes Wi-Fi credentials to the bound appliance.
    ///
    /// Two sequential writes to the credential characteristic: network name,
    /// then passphrase.  Both are validated before the first byte leaves.
    ///
    /// # Errors
    ///
    /// [`ProvisionError::Validation`] rejects empty fields before any write.
    /// [`ProvisionError::WriteFailed`] means nothing was delivered;
    /// [`ProvisionError::PartialWrite`] means the name landed but the
    /// passphrase did not, so the appliance is in a half-provisioned state.
    pub async fn send_credentials(
        &mut self,
        network_name: &str,
        passphrase: &str,
    ) -> Result<(), ProvisionError> {
        let id = match &self.state {
            ProvisionState::Bound(id) | ProvisionState::AwaitingIp(id) => id.clone(),
            _ => return Err(ProvisionError::NotConnected),
        };
        if network_name.is_empty() || passphrase.is_empty() {
            return Err(ProvisionError::Validation);
        }

        self.radio
            .write(
                CREDENTIAL_SERVICE,
                CREDENTIAL_CHARACTERISTIC,
                network_name.as_bytes(),
            )
            .await
            .map_err(|e| ProvisionError::WriteFailed(e.to_string()))?;
        self.radio
            .write(
                CREDENTIAL_SERVICE,
                CREDENTIAL_CHARACTERISTIC,
                passphrase.as_bytes(),
            )
            .await
            .map_err(|e| ProvisionError::PartialWrite(e.to_string()))?;

        info!(%id, "credentials delivered, awaiting address report");
        self.state = ProvisionState::AwaitingIp(id);
        Ok(())
    }

    /// Consumes one notification frame from the bound appliance.
    ///
    /// Malformed frames are logged and dropped; the stream continues.
    pub async fn handle_notification(&mut self, bytes: &[u8], registry: &mut DeviceRegistry) {
        let Some(id) = self.bound_id().cloned() else {
            return;
        };

        let fragment = match parse_notification(bytes) {
            Ok(fragment) => fragment,
            Err(e) => {
                debug!(%id, "dropping malformed frame: {e}");
                return;
            }
        };

        match fragment {
            Fragment::Ip(ip) => {
                if !registry.is_connected(&id) {
                    let name = self.pending_name.take().unwrap_or_default();
                    let buffer = std::mem::take(&mut self.buffer);
                    let record = ConnectedDevice {
                        id: id.clone(),
                        name,
                        ip: ip.clone(),
                        port: buffer.port,
                        user: buffer.user,
                        password: buffer.password,
                        client_id: buffer.client_id,
                    };
                    registry.insert_connected(record);
                    info!(%id, %ip, "appliance promoted to connected");
                    let _ = self
                        .event_tx
                        .send(ProvisioningEvent::Promoted { id: id.clone(), ip })
                        .await;
                }
                self.state = ProvisionState::Ready(id);
            }
            Fragment::Error(message) => {
                warn!(%id, %message, "appliance aborted provisioning");
                let _ = self
                    .event_tx
                    .send(ProvisioningEvent::Aborted {
                        id: id.clone(),
                        message,
                    })
                    .await;
                self.buffer = FieldBuffer::default();
                self.pending_name = None;
                self.radio.disconnect().await;
                // Registry untouched: a failed attempt never creates or
                // deletes records.
                self.state = ProvisionState::Idle;
            }
            enrichment => {
                self.apply_enrichment(&id, enrichment, registry);
            }
        }
    }

    /// The peripheral link dropped.  Any in-flight attempt is abandoned; a
    /// `Ready` record survives, the registry is never touched.
    pub async fn handle_device_disconnected(&mut self) {
        let Some(id) = self.bound_id().cloned() else {
            return;
        };
        info!(%id, "peripheral link dropped");
        self.buffer = FieldBuffer::default();
        self.pending_name = None;
        self.state = ProvisionState::Idle;
        let _ = self
            .event_tx
            .send(ProvisioningEvent::Disconnected(id))
            .await;
    }

    /// User-initiated escape hatch: drop whatever is in flight and return
    /// to `Idle`.
    pub async fn cancel(&mut self, registry: &mut DeviceRegistry) {
        match self.state {
            ProvisionState::Idle => return,
            ProvisionState::Scanning => {
                self.finish_scan(registry).await;
                return;
            }
            _ => {}
        }
        self.radio.disconnect().await;
        self.buffer = FieldBuffer::default();
        self.pending_name = None;
        self.state = ProvisionState::Idle;
    }

    /// Applies one non-promoting field, last write wins.  Fields for an
    /// already-promoted device land in the registry record; earlier ones
    /// wait in the buffer.
    fn apply_enrichment(
        &mut self,
        id: &DeviceId,
        fragment: Fragment,
        registry: &mut DeviceRegistry,
    ) {
        if let Some(record) = registry.get_connected_mut(id) {
            match fragment {
                Fragment::Port(v) => record.port = Some(v),
                Fragment::User(v) => record.user = Some(v),
                Fragment::Password(v) => record.password = Some(v),
                Fragment::ClientId(v) => record.client_id = Some(v),
                Fragment::Ip(_) | Fragment::Error(_) => {}
            }
        } else {
            match fragment {
                Fragment::Port(v) => self.buffer.port = Some(v),
                Fragment::User(v) => self.buffer.user = Some(v),
                Fragment::Password(v) => self.buffer.password = Some(v),
                Fragment::ClientId(v) => self.buffer.client_id = Some(v),
                Fragment::Ip(_) | Fragment::Error(_) => {}
            }
        }
    }

    fn bound_id(&self) -> Option<&DeviceId> {
        match &self.state {
            ProvisionState::Connecting(id)
            | ProvisionState::Bound(id)
            | ProvisionState::AwaitingIp(id)
            | ProvisionState::Ready(id) => Some(id),
            ProvisionState::Idle | ProvisionState::Scanning => None,
        }
    }

    async fn finish_scan(&mut self, registry: &mut DeviceRegistry) {
        self.scan_timer.cancel();
        self.radio.stop_scan().await;
        registry.clear_discovered();
        self.state = ProvisionState::Idle;
        let _ = self.event_tx.send(ProvisioningEvent::ScanFinished).await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::radio::mock::MockRadio;

    fn service() -> (
        ProvisioningService<MockRadio>,
        mpsc::Receiver<ProvisioningEvent>,
        mpsc::Receiver<()>,
    ) {
        ProvisioningService::new(MockRadio::new(), "TK".to_string(), Duration::from_secs(7))
    }

    fn advert(id: &str, name: &str) -> Advert {
        Advert {
            id: id.to_string(),
            name: Some(name.to_string()),
        }
    }

    #[tokio::test]
    async fn test_scan_filters_by_name_prefix() {
        let (mut service, _events, _timeouts) = service();
        let mut registry = DeviceRegistry::new();

        service.toggle_scan(&mut registry).await.unwrap();
        service.handle_scan_result(advert("aa", "TK-001"), &mut registry).await;
        service.handle_scan_result(advert("bb", "XX-002"), &mut registry).await;
        service
            .handle_scan_result(Advert { id: "cc".to_string(), name: None }, &mut registry)
            .await;

        let names: Vec<_> = registry.discovered().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["TK-001"]);
    }

    #[tokio::test]
    async fn test_toggle_while_scanning_stops_and_clears() {
        let (mut service, _events, _timeouts) = service();
        let mut registry = DeviceRegistry::new();

        service.toggle_scan(&mut registry).await.unwrap();
        service.handle_scan_result(advert("aa", "TK-001"), &mut registry).await;

        let result = service.toggle_scan(&mut registry).await.unwrap();
        assert!(result.is_none());
        assert_eq!(service.state(), &ProvisionState::Idle);
        assert!(registry.discovered().is_empty());
        assert_eq!(service.radio().scans_stopped, 1);
    }

    #[tokio::test]
    async fn test_connect_requires_a_discovered_id() {
        let (mut service, _events, _timeouts) = service();
        let mut registry = DeviceRegistry::new();

        service.toggle_scan(&mut registry).await.unwrap();
        let result = service.connect_device(&"ghost".to_string(), &mut registry).await;

        assert!(matches!(result, Err(ProvisionError::UnknownDevice(_))));
        // Still scanning; an unknown id must not tear the scan down.
        assert_eq!(service.state(), &ProvisionState::Scanning);
    }

    #[tokio::test]
    async fn test_send_credentials_rejects_empty_fields_before_writing() {
        let (mut service, _events, _timeouts) = service();
        let mut registry = DeviceRegistry::new();

        service.toggle_scan(&mut registry).await.unwrap();
        service.handle_scan_result(advert("aa", "TK-001"), &mut registry).await;
        service.connect_device(&"aa".to_string(), &mut registry).await.unwrap();

        let result = service.send_credentials("", "secret").await;
        assert_eq!(result, Err(ProvisionError::Validation));
        assert!(service.radio().writes.is_empty(), "nothing may reach the appliance");
    }

    #[tokio::test]
    async fn test_error_frame_aborts_without_touching_registry() {
        let (mut service, mut events, _timeouts) = service();
        let mut registry = DeviceRegistry::new();

        service.toggle_scan(&mut registry).await.unwrap();
        service.handle_scan_result(advert("aa", "TK-001"), &mut registry).await;
        service.connect_device(&"aa".to_string(), &mut registry).await.unwrap();
        service.send_credentials("HomeNet", "secret").await.unwrap();

        service
            .handle_notification("Error:Datos de red incorrectos".as_bytes(), &mut registry)
            .await;

        assert_eq!(service.state(), &ProvisionState::Idle);
        assert!(registry.connected().is_empty());
        assert_eq!(service.radio().disconnects, 1);

        // Drain to the abort event and check the message is verbatim.
        let mut aborted = None;
        while let Ok(event) = events.try_recv() {
            if let ProvisioningEvent::Aborted { message, .. } = event {
                aborted = Some(message);
            }
        }
        assert_eq!(aborted.as_deref(), Some("Datos de red incorrectos"));
    }
}
