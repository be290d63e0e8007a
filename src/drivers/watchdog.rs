//! External watchdog (TPL5010) driver.
//!
//! The timer raises WAKE on a fixed interval; if DONE is not pulsed before
//! the next interval it pulls the reset line.  The WAKE edge only sets
//! [`WATCHDOG_KICK`](crate::events::WATCHDOG_KICK); the main loop calls
//! [`ExternalWatchdog::pet`] when it takes the flag, and sleeping states
//! pet unconditionally before suspending.

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init::gpio_write;
#[cfg(target_os = "espidf")]
use crate::pins;

pub struct ExternalWatchdog {
    #[cfg(not(target_os = "espidf"))]
    pets: u32,
}

impl Default for ExternalWatchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl ExternalWatchdog {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            pets: 0,
        }
    }

    /// Pulse DONE.
    pub fn pet(&mut self) {
        #[cfg(target_os = "espidf")]
        {
            gpio_write(pins::WDT_DONE_GPIO, true);
            gpio_write(pins::WDT_DONE_GPIO, false);
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.pets += 1;
        }
    }

    /// Number of DONE pulses so far (host builds only).
    #[cfg(not(target_os = "espidf"))]
    pub fn pets(&self) -> u32 {
        self.pets
    }
}
