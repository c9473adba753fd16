//! # frostlink-app
//!
//! The connectivity application: broker session management, device liveness
//! monitoring, cooling control, and short-range provisioning for the
//! appliance fleet.
//!
//! # Architecture
//!
//! ```text
//!                    ┌────────────── dispatch loop ──────────────┐
//!                    │  (single task, owns every &mut service)   │
//!                    ▼                                           ▼
//!  rumqttc ──► BrokerSession ──SessionEvent──► DeviceMonitor ──► observers
//!                    ▲                               ▲
//!              retry timer                     liveness ticker
//!
//!  radio ───► ProvisioningService ──ProvisioningEvent──► observers
//!                    ▲                        │
//!              scan timeout                DeviceRegistry
//! ```
//!
//! Every service hands its constructor caller an event receiver and, where
//! it owns a timer, the timer's receiver.  The dispatch loop selects over
//! all of them and calls back into the services; no service spawns its own
//! mutation task, so all state transitions are serialized.

pub mod application;
pub mod infrastructure;

pub use application::control::{ControlError, CoolingControl};
pub use application::monitor::{DeviceMonitor, MonitorEvent, TelemetrySnapshot};
pub use application::provisioning::{
    ProvisionError, ProvisionState, ProvisioningEvent, ProvisioningService,
};
pub use infrastructure::broker::{
    BrokerOptions, BrokerSession, BrokerTransport, QosLevel, SessionError, SessionEvent,
    SessionState, TopicSet, TransportEvent,
};
pub use infrastructure::config::{AppConfig, ConfigError};
pub use infrastructure::radio::{Advert, RadioError, ShortRangeTransport};
