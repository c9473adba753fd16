//! Recording radio mock for tests.
//!
//! Same shape as the broker mock: plain public fields record every call,
//! failure injection is a field set before the call, and tests inject
//! adverts and notifications through the senders this mock keeps alive.

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use frostlink_core::DeviceId;

use super::{Advert, RadioError, ShortRangeTransport};

/// A scriptable in-memory [`ShortRangeTransport`].
pub struct MockRadio {
    /// When set, `ensure_ready` fails with this error.
    pub ready_error: Option<RadioError>,
    /// When set, `connect` fails with this reason.
    pub connect_error: Option<String>,
    /// When set, the nth write (zero-based) fails; earlier writes succeed.
    pub fail_write_at: Option<usize>,
    /// Every write: `(service, characteristic, payload)`.
    pub writes: Vec<(Uuid, Uuid, Vec<u8>)>,
    pub scans_started: usize,
    pub scans_stopped: usize,
    pub connects: Vec<DeviceId>,
    pub disconnects: usize,
    scan_tx: Option<mpsc::Sender<Advert>>,
    notify_tx: Option<mpsc::Sender<Vec<u8>>>,
}

impl MockRadio {
    pub fn new() -> Self {
        Self {
            ready_error: None,
            connect_error: None,
            fail_write_at: None,
            writes: Vec::new(),
            scans_started: 0,
            scans_stopped: 0,
            connects: Vec::new(),
            disconnects: 0,
            scan_tx: None,
            notify_tx: None,
        }
    }

    /// Sender for injecting adverts into the most recent scan.
    pub fn scan_injector(&self) -> Option<mpsc::Sender<Advert>> {
        self.scan_tx.clone()
    }

    /// Sender for injecting notifications into the most recent monitor.
    pub fn notify_injector(&self) -> Option<mpsc::Sender<Vec<u8>>> {
        self.notify_tx.clone()
    }
}

impl Default for MockRadio {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShortRangeTransport for MockRadio {
    async fn ensure_ready(&mut self) -> Result<(), RadioError> {
        match &self.ready_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn start_scan(&mut self) -> Result<mpsc::Receiver<Advert>, RadioError> {
        self.scans_started += 1;
        let (tx, rx) = mpsc::channel(16);
        self.scan_tx = Some(tx);
        Ok(rx)
    }

    async fn stop_scan(&mut self) {
        self.scans_stopped += 1;
        self.scan_tx = None;
    }

    async fn connect(&mut self, id: &DeviceId) -> Result<(), RadioError> {
        self.connects.push(id.clone());
        match &self.connect_error {
            Some(reason) => Err(RadioError::ConnectFailed {
                id: id.clone(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn discover_capabilities(&mut self) -> Result<(), RadioError> {
        Ok(())
    }

    async fn monitor(
        &mut self,
        _service: Uuid,
        _characteristic: Uuid,
    ) -> Result<mpsc::Receiver<Vec<u8>>, RadioError> {
        let (tx, rx) = mpsc::channel(16);
        self.notify_tx = Some(tx);
        Ok(rx)
    }

    async fn write(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
        payload: &[u8],
    ) -> Result<(), RadioError> {
        if self.fail_write_at == Some(self.writes.len()) {
            return Err(RadioError::WriteFailed("injected write failure".to_string()));
        }
        self.writes.push((service, characteristic, payload.to_vec()));
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.disconnects += 1;
        self.notify_tx = None;
    }
}
