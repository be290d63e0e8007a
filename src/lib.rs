//! OccuCount firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod counter;
pub mod error;
pub mod escalation;
pub mod events;
pub mod fsm;
pub mod notify;
pub mod power;
pub mod registers;
pub mod schedule;
pub mod telemetry;
pub mod upload;

pub mod pins;

// Adapters and drivers carry both backends; the hardware halves are
// guarded by cfg attributes inside.
pub mod adapters;
pub mod drivers;

#[cfg(test)]
mod testkit;
