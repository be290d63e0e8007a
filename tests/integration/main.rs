//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the simulated adapters.  All tests run on the host (x86_64)
//! with no real hardware required.

#![cfg(not(target_os = "espidf"))]

mod console_tests;
mod fsm_flow_tests;
mod mock_device;
