//! Infrastructure: transports, timers, and configuration.
//!
//! Everything here touches the outside world (network, radio, clock,
//! filesystem).  The application layer only sees the traits and channels
//! exported from these modules.

pub mod broker;
pub mod config;
pub mod radio;
pub mod timer;
