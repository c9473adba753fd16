//! Application services.
//!
//! Domain logic driven by the dispatch loop: the device monitor (liveness
//! and telemetry), the provisioning state machine, and the cooling control
//! path.  Nothing here opens a socket or touches a radio directly; each
//! service talks to its transport trait.

pub mod control;
pub mod monitor;
pub mod provisioning;
