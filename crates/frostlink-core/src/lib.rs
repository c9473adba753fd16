//! # frostlink-core
//!
//! Shared library for Frostlink containing the device registry, the liveness
//! window arithmetic, and the text-frame protocol spoken by the appliance.
//!
//! This crate is used by the connectivity application and by its test suites.
//! It has zero dependencies on OS APIs, async runtimes, or network sockets.
//!
//! # Architecture overview
//!
//! Frostlink remote-controls a cooling appliance over two channels:
//!
//! - A short-range provisioning link, used once to hand the appliance its
//!   Wi-Fi credentials.  The appliance answers with a stream of text frames
//!   (`IP:…`, `PORT:…`, …) that incrementally describe how to reach it.
//! - A persistent MQTT broker link carrying telemetry (temperature, status)
//!   and control commands afterwards.
//!
//! This crate defines:
//!
//! - **`domain`** – Pure state with no I/O: the registry of discovered and
//!   connected appliances, and the countdown window that decides whether an
//!   appliance is still reporting.
//!
//! - **`protocol`** – How text travels over both channels.  Provisioning
//!   frames are parsed into typed [`Fragment`]s; broker payloads are decoded
//!   by small total functions that never panic on garbage input.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `frostlink_core::DeviceRegistry` instead of the full module path.
pub use domain::liveness::{LivenessWindow, Tick};
pub use domain::registry::{ConnectedDevice, DeviceId, DeviceRegistry, DiscoveredDevice};
pub use protocol::fragment::{parse_fragment, parse_notification, FrameError, Fragment};
pub use protocol::telemetry::{encode_flag, parse_flag, parse_temperature};
