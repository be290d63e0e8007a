//! Interrupt-to-main-loop signalling.
//!
//! Two hardware interrupts feed the engine:
//! - the presence sensor's rising edge ("an object arrived"), and
//! - the external watchdog's wake output ("pet me soon").
//!
//! ISRs only raise a flag; the main loop takes it.  Each flag is a single
//! atomic bool, so a burst of edges between two loop cycles collapses into
//! one event, and the debounce engine treats it as one.
//!
//! ```text
//! ┌─────────────┐  raise()   ┌───────────┐  take()   ┌──────────────┐
//! │ GPIO ISR    │──────────▶│  IsrFlag  │─────────▶│  Main Loop   │
//! └─────────────┘            └───────────┘           └──────────────┘
//! ```

use core::sync::atomic::{AtomicBool, Ordering};

/// A one-bit mailbox safe to raise from interrupt context.
pub struct IsrFlag(AtomicBool);

impl IsrFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Set the flag.  Lock-free; callable from an ISR.
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    /// Read without clearing.
    pub fn peek(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for IsrFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Raised by the sensor-line ISR.
pub static SENSOR_EDGE: IsrFlag = IsrFlag::new();

/// Raised by the external watchdog's wake ISR.
pub static WATCHDOG_KICK: IsrFlag = IsrFlag::new();
