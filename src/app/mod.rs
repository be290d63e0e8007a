//! Application core: domain orchestration behind port traits.
//!
//! This module holds the occupancy counter's outer layer: the service that
//! owns the FSM, the operator console and the event vocabulary.  All
//! interaction with hardware happens through the **port traits** defined
//! in [`ports`], keeping this layer fully testable without real peripherals.

pub mod console;
pub mod events;
pub mod ports;
pub mod service;
