//! Debounce and counter engine.
//!
//! Turns raw sensor edges into durable counts.  An edge is accepted when
//! at least the debounce interval has passed since the last accepted one,
//! or unconditionally right after a nap (uptime bookkeeping across light
//! sleep is not trusted).  After accepting, the engine holds the caller in
//! a bounded wait until the debounce interval has run out; the device has
//! nothing else to do during that window.
//!
//! A per-minute tally guards against a chattering sensor.  When the tally
//! reaches the configured limit the whole burst is backed out of both
//! counters, an alert is raised, and the corrected counters are written
//! before returning, so the store never holds the un-reversed values.

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use crate::app::ports::Ports;
use crate::config::timing;
use crate::error::StorageError;
use crate::registers::Registers;

/// What happened to one sensor edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountOutcome {
    /// Counted; the new totals.
    Accepted { hourly: u16, daily: u16 },
    /// Inside the debounce window; ignored.
    Debounced,
    /// Burst detected; `removed` events (including this one) are not
    /// counted.
    BurstReversed { removed: u16 },
}

/// Transient per-boot counting state.
#[derive(Debug, Clone, Default)]
pub struct CounterEngine {
    last_accept_ms: Option<u64>,
    minute: Option<i64>,
    minute_tally: u16,
    max_per_minute: u16,
}

impl CounterEngine {
    pub const fn new() -> Self {
        Self {
            last_accept_ms: None,
            minute: None,
            minute_tally: 0,
            max_per_minute: 0,
        }
    }

    /// Highest per-minute tally seen this reporting period.
    pub fn max_per_minute(&self) -> u16 {
        self.max_per_minute
    }

    /// Tally for the current minute.
    pub fn minute_tally(&self) -> u16 {
        self.minute_tally
    }

    /// Start a new reporting period for the max-per-minute diagnostic.
    pub fn reset_period(&mut self) {
        self.max_per_minute = 0;
    }

    /// Evaluate one sensor edge and apply it to `regs`, persisting every
    /// change through `ports.store` before returning.
    pub fn record(
        &mut self,
        regs: &mut Registers,
        ports: &mut Ports<'_>,
        woke_from_nap: bool,
    ) -> Result<CountOutcome, StorageError> {
        let debounce_ms = regs.config.debounce_ms();
        let now_ms = ports.clock.uptime_ms();
        let spaced = self
            .last_accept_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= debounce_ms);
        if !spaced && !woke_from_nap {
            debug!("Sensor edge debounced");
            return Ok(CountOutcome::Debounced);
        }

        self.last_accept_ms = Some(now_ms);
        Self::hold_off(ports, now_ms, debounce_ms);

        let minute = ports.clock.now_unix().div_euclid(60);
        if self.minute == Some(minute) {
            self.minute_tally += 1;
        } else {
            self.minute = Some(minute);
            self.minute_tally = 1;
        }
        self.max_per_minute = self.max_per_minute.max(self.minute_tally);

        if self.minute_tally >= u16::from(regs.config.max_per_minute) {
            let removed = self.minute_tally;
            let applied = removed - 1;
            regs.hourly = regs.hourly.saturating_sub(applied);
            regs.daily = regs.daily.saturating_sub(applied);
            regs.alert_count = regs.alert_count.saturating_add(1);
            self.minute_tally = 0;
            regs.store_counts(ports.store)?;
            regs.store_alert_count(ports.store)?;
            warn!("Burst of {} events in one minute, counts reversed", removed);
            return Ok(CountOutcome::BurstReversed { removed });
        }

        regs.hourly = regs.hourly.saturating_add(1);
        regs.daily = regs.daily.saturating_add(1);
        regs.last_event = ports.clock.now_unix().max(0) as u32;
        regs.store_counts(ports.store)?;
        regs.store_last_event(ports.store)?;
        Ok(CountOutcome::Accepted {
            hourly: regs.hourly,
            daily: regs.daily,
        })
    }

    /// Block until `debounce_ms` has elapsed since `accepted_at`.  Bounded
    /// by a poll budget in case the clock stalls.  Edges raised during the
    /// wait belong to the accepted event and are dropped.
    fn hold_off(ports: &mut Ports<'_>, accepted_at: u64, debounce_ms: u64) {
        let poll = u64::from(timing::DEBOUNCE_POLL_MS);
        let mut budget = debounce_ms / poll + 1;
        while budget > 0 && ports.clock.uptime_ms().saturating_sub(accepted_at) < debounce_ms {
            ports.system.delay_ms(timing::DEBOUNCE_POLL_MS);
            budget -= 1;
        }
        if ports.board.take_sensor_event() {
            debug!("Dropped chatter inside debounce window");
        }
    }
}
