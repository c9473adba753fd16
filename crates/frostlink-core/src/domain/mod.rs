//! Pure domain state: device records and liveness arithmetic.
//!
//! Nothing in this module performs I/O or spawns tasks.  The application
//! layer drives these types from its single dispatch loop, which is what
//! makes them lock-free and trivially unit-testable.

pub mod liveness;
pub mod registry;
