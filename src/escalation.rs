//! Failure escalation policy.
//!
//! Unplanned resets (watchdog, reset pin, firmware restart) and in-loop
//! `Error` recoveries share one persisted ledger, `reset_count`.  Below the
//! ceiling, recovery is a plain restart.  At or above it the ledger is
//! zeroed and the modem itself is reset, followed by a short deep sleep
//! that reboots the whole device.
//!
//! ## Ledger lifecycle
//!
//! 1. Boot sees an unplanned reset cause: `reset_count += 1`, persisted.
//! 2. Boot finds `reset_count >= ceiling`: go straight to `Error`.
//! 3. `Error` cools down, then [`EscalationPolicy::decide`] picks the
//!    recovery and [`EscalationPolicy::execute`] carries it out.
//! 4. Day rollover and the `resetCounts` console command zero the ledger.

use embedded_hal::delay::DelayNs;
use log::{error, info, warn};

use crate::app::ports::{Ports, ResetReason};
use crate::config::timing;
use crate::error::StorageError;
use crate::registers::Registers;

/// Poll interval while waiting for the link to drop.
const DISCONNECT_POLL_MS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Software restart.
    Restart,
    /// Drop the session, reset the modem, deep-sleep briefly.
    ModemReset,
}

#[derive(Debug, Clone, Copy)]
pub struct EscalationPolicy {
    ceiling: u8,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl EscalationPolicy {
    pub const fn new() -> Self {
        Self {
            ceiling: timing::ESCALATION_CEILING,
        }
    }

    pub fn ceiling(&self) -> u8 {
        self.ceiling
    }

    /// Fold the platform reset cause into the ledger.  Returns whether the
    /// reset counted.
    pub fn note_boot(
        &self,
        regs: &mut Registers,
        reason: ResetReason,
        ports: &mut Ports<'_>,
    ) -> Result<bool, StorageError> {
        if !reason.is_unplanned() {
            return Ok(false);
        }
        regs.reset_count = regs.reset_count.saturating_add(1);
        regs.store_reset_count(ports.store)?;
        warn!("Unplanned reset ({:?}), reset count now {}", reason, regs.reset_count);
        Ok(true)
    }

    /// Whether boot should refuse to run and go to `Error` instead.
    pub fn should_halt_at_boot(&self, regs: &Registers) -> bool {
        regs.reset_count >= self.ceiling
    }

    pub fn decide(&self, reset_count: u8) -> Recovery {
        if reset_count < self.ceiling {
            Recovery::Restart
        } else {
            Recovery::ModemReset
        }
    }

    /// Carry out `recovery`.  On hardware neither branch returns.
    pub fn execute(
        &self,
        recovery: Recovery,
        regs: &mut Registers,
        ports: &mut Ports<'_>,
    ) -> Result<(), StorageError> {
        match recovery {
            Recovery::Restart => {
                info!("Recovery: restart ({} of {})", regs.reset_count, self.ceiling);
                ports.system.restart();
            }
            Recovery::ModemReset => {
                regs.reset_count = 0;
                regs.store_reset_count(ports.store)?;
                full_modem_reset(ports);
            }
        }
        Ok(())
    }
}

/// Disconnect, wait for the session to drop, reset the modem and
/// deep-sleep so the device comes back from a cold start.
pub fn full_modem_reset(ports: &mut Ports<'_>) {
    warn!("Full modem reset");
    ports.link.disconnect();
    let start = ports.clock.uptime_ms();
    let mut budget = timing::DISCONNECT_WAIT_MS / u64::from(DISCONNECT_POLL_MS) + 1;
    while ports.link.is_connected()
        && ports.clock.uptime_ms().saturating_sub(start) < timing::DISCONNECT_WAIT_MS
        && budget > 0
    {
        ports.system.delay_ms(DISCONNECT_POLL_MS);
        budget -= 1;
    }
    if let Err(e) = ports.link.reset_modem() {
        error!("Modem reset failed: {}", e);
    }
    ports.system.delay_ms(timing::MODEM_POWER_DOWN_SETTLE_MS);
    ports.system.deep_sleep(timing::MODEM_RESET_SLEEP_SECS);
}
