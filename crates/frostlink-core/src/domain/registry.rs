//! DeviceRegistry: in-memory records of discovered and connected appliances.
//!
//! The registry is the single owner of device identity.  Other components
//! (broker session, liveness tracker) only hold session or liveness state
//! keyed by device id; they never mutate the records stored here.
//!
//! # Device lifecycle
//!
//! ```text
//! (scan advert)      (IP frame received)
//! Discovered  ──────►  Connected
//!     │
//!     └─ dropped when the scan session ends without a connection
//! ```
//!
//! - `Discovered`: a short-range advert matched the name prefix.  The entry
//!   is ephemeral and carries no network information.
//! - `Connected`: the appliance pushed its `IP` frame during provisioning.
//!   The remaining fields (`port`, `user`, …) arrive at the appliance's
//!   discretion and are filled in incrementally.
//!
//! # Invariants
//!
//! - A device id appears at most once in the connected set; inserting an
//!   existing id is a no-op, never a duplicate.
//! - A device id never appears in both sets: promotion removes the
//!   discovered entry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Opaque device handle (the transport's address string, e.g. a BLE MAC).
pub type DeviceId = String;

/// An appliance seen during a scan but not yet provisioned.
///
/// The radio-side connection handle is deliberately *not* stored here; it is
/// owned exclusively by the provisioning state machine while connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub id: DeviceId,
    pub name: String,
}

/// A provisioned appliance reachable over the broker link.
///
/// Only `ip` is required for the record to exist; every other field is an
/// optional enrichment delivered by a later provisioning frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedDevice {
    pub id: DeviceId,
    pub name: String,
    pub ip: String,
    pub port: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
}

impl ConnectedDevice {
    /// A record is usable once the appliance has reported its address.
    pub fn is_usable(&self) -> bool {
        !self.ip.is_empty()
    }
}

/// In-memory registry of every appliance the application knows about.
///
/// # Collection choice
///
/// The discovered set is a `Vec` because scan results are shown to the user
/// in arrival order; the connected set is a `HashMap<DeviceId, _>` for O(1)
/// id lookup during fragment enrichment.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    discovered: Vec<DiscoveredDevice>,
    connected: HashMap<DeviceId, ConnectedDevice>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a scan discovery.
    ///
    /// Returns `false` (and changes nothing) when the device is already in
    /// the discovered list or already connected — dedup by id.
    pub fn add_discovered(&mut self, device: DiscoveredDevice) -> bool {
        if self.connected.contains_key(&device.id)
            || self.discovered.iter().any(|d| d.id == device.id)
        {
            return false;
        }
        self.discovered.push(device);
        true
    }

    /// Removes one discovered entry, e.g. when a connection attempt starts.
    pub fn remove_discovered(&mut self, id: &str) {
        self.discovered.retain(|d| d.id != id);
    }

    /// Drops every discovered entry (scan session ended without connecting).
    pub fn clear_discovered(&mut self) {
        self.discovered.clear();
    }

    /// Drops discovered entries that have since become connected.
    ///
    /// Called when a new scan starts, so stale adverts from a previous scan
    /// do not shadow an appliance that was provisioned in the meantime.
    pub fn prune_discovered(&mut self) {
        let connected = &self.connected;
        self.discovered.retain(|d| !connected.contains_key(&d.id));
    }

    /// Snapshot of the discovered set, in arrival order.
    pub fn discovered(&self) -> &[DiscoveredDevice] {
        &self.discovered
    }

    /// Promotes a device to the connected set.
    ///
    /// Returns `false` when the id is already connected; the existing record
    /// is kept untouched (re-adding is a no-op, not an overwrite).  The
    /// discovered entry for the id is removed either way.
    pub fn insert_connected(&mut self, device: ConnectedDevice) -> bool {
        self.remove_discovered(&device.id.clone());
        if self.connected.contains_key(&device.id) {
            return false;
        }
        self.connected.insert(device.id.clone(), device);
        true
    }

    pub fn get_connected(&self, id: &str) -> Option<&ConnectedDevice> {
        self.connected.get(id)
    }

    /// Mutable access for field enrichment (last-write-wins per field).
    pub fn get_connected_mut(&mut self, id: &str) -> Option<&mut ConnectedDevice> {
        self.connected.get_mut(id)
    }

    pub fn is_connected(&self, id: &str) -> bool {
        self.connected.contains_key(id)
    }

    /// Snapshot of all connected devices.
    pub fn connected(&self) -> Vec<ConnectedDevice> {
        self.connected.values().cloned().collect()
    }

    /// Removes a connected device entirely.
    pub fn remove_connected(&mut self, id: &str) {
        self.connected.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advert(id: &str, name: &str) -> DiscoveredDevice {
        DiscoveredDevice {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn connected(id: &str, ip: &str) -> ConnectedDevice {
        ConnectedDevice {
            id: id.to_string(),
            name: "TK-2025-MA00-0001".to_string(),
            ip: ip.to_string(),
            port: None,
            user: None,
            password: None,
            client_id: None,
        }
    }

    #[test]
    fn test_registry_starts_empty() {
        let registry = DeviceRegistry::new();
        assert!(registry.discovered().is_empty());
        assert!(registry.connected().is_empty());
    }

    #[test]
    fn test_add_discovered_dedups_by_id() {
        let mut registry = DeviceRegistry::new();
        assert!(registry.add_discovered(advert("aa:bb", "TK-001")));
        assert!(!registry.add_discovered(advert("aa:bb", "TK-001")));
        assert_eq!(registry.discovered().len(), 1);
    }

    #[test]
    fn test_add_discovered_skips_already_connected_device() {
        let mut registry = DeviceRegistry::new();
        registry.insert_connected(connected("aa:bb", "10.0.0.5"));
        assert!(!registry.add_discovered(advert("aa:bb", "TK-001")));
        assert!(registry.discovered().is_empty());
    }

    #[test]
    fn test_insert_connected_is_noop_for_existing_id() {
        let mut registry = DeviceRegistry::new();
        assert!(registry.insert_connected(connected("aa:bb", "10.0.0.5")));

        // A second promotion for the same id must not overwrite the record.
        assert!(!registry.insert_connected(connected("aa:bb", "192.168.1.9")));
        assert_eq!(registry.get_connected("aa:bb").unwrap().ip, "10.0.0.5");
        assert_eq!(registry.connected().len(), 1);
    }

    #[test]
    fn test_insert_connected_removes_discovered_entry() {
        let mut registry = DeviceRegistry::new();
        registry.add_discovered(advert("aa:bb", "TK-001"));
        registry.insert_connected(connected("aa:bb", "10.0.0.5"));
        assert!(registry.discovered().is_empty());
    }

    #[test]
    fn test_prune_discovered_drops_connected_ids_only() {
        let mut registry = DeviceRegistry::new();
        registry.add_discovered(advert("aa:bb", "TK-001"));
        registry.add_discovered(advert("cc:dd", "TK-002"));
        registry.connected.insert(
            "aa:bb".to_string(),
            connected("aa:bb", "10.0.0.5"),
        );

        registry.prune_discovered();

        assert_eq!(registry.discovered().len(), 1);
        assert_eq!(registry.discovered()[0].id, "cc:dd");
    }

    #[test]
    fn test_enrichment_through_mutable_access() {
        let mut registry = DeviceRegistry::new();
        registry.insert_connected(connected("aa:bb", "10.0.0.5"));

        registry.get_connected_mut("aa:bb").unwrap().port = Some("1883".to_string());
        assert_eq!(
            registry.get_connected("aa:bb").unwrap().port.as_deref(),
            Some("1883")
        );
    }

    #[test]
    fn test_is_usable_requires_nonempty_ip() {
        assert!(connected("aa:bb", "10.0.0.5").is_usable());
        assert!(!connected("aa:bb", "").is_usable());
    }
}
