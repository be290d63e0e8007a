//! Board drivers, hardware initialisation, and conversion helpers.

pub mod hw_init;
pub mod modem;
pub mod tmp36;
pub mod watchdog;
