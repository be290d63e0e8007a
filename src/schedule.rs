//! Clock and schedule policy.
//!
//! Local calendar fields come from the wall clock plus a whole-hour
//! offset.  [`evaluate`] is the Idle state's decision table: given the
//! time, the battery and the stay-awake window, should the device keep
//! sensing, nap, report, sleep, or protect the battery?
//!
//! Open hours are the half-open interval `[open, close)` in local hours.
//! When `open > close` the interval wraps midnight; `open == close` means
//! open around the clock.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Timelike, Utc};

use crate::config::{DeviceConfig, timing};

// ───────────────────────────────────────────────────────────────
// Local time
// ───────────────────────────────────────────────────────────────

/// Calendar fields of a wall-clock instant in the device's time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    pub date: NaiveDate,
    pub hour: u8,
    pub minute: u8,
}

impl LocalTime {
    pub fn at(unix: i64, time_zone: i8) -> Self {
        let local = local_datetime(unix, time_zone);
        Self {
            date: local.date_naive(),
            hour: local.hour() as u8,
            minute: local.minute() as u8,
        }
    }

    pub fn day(&self) -> u32 {
        self.date.day()
    }
}

fn local_datetime(unix: i64, time_zone: i8) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(i32::from(time_zone) * 3600).unwrap_or_else(|| Utc.fix());
    DateTime::<Utc>::from_timestamp(unix, 0)
        .unwrap_or_default()
        .with_timezone(&offset)
}

/// Whether two instants fall on different local calendar days.
pub fn is_new_day(last_unix: i64, now_unix: i64, time_zone: i8) -> bool {
    LocalTime::at(last_unix, time_zone).date != LocalTime::at(now_unix, time_zone).date
}

/// Seconds until the next wake boundary, in `1..=WAKE_BOUNDARY_SECS`.
/// Boundaries are aligned to UTC hours, which coincide with local hours
/// for whole-hour offsets.
pub fn secs_until_boundary(now_unix: i64) -> u32 {
    let period = i64::from(timing::WAKE_BOUNDARY_SECS);
    let remaining = period - now_unix.rem_euclid(period);
    remaining.clamp(1, period) as u32
}

// ───────────────────────────────────────────────────────────────
// Open hours
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenHours {
    pub open: u8,
    pub close: u8,
}

impl OpenHours {
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self {
            open: config.open_hour,
            close: config.close_hour,
        }
    }

    pub fn is_open(&self, hour: u8) -> bool {
        use core::cmp::Ordering;
        match self.open.cmp(&self.close) {
            Ordering::Equal => true,
            Ordering::Less => hour >= self.open && hour < self.close,
            Ordering::Greater => hour >= self.open || hour < self.close,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Idle decision table
// ───────────────────────────────────────────────────────────────

/// Everything the Idle decision depends on.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleInputs {
    pub now_unix: i64,
    pub uptime_ms: u64,
    pub state_of_charge: u8,
    pub low_battery_limit: u8,
    pub low_power: bool,
    /// Local hour of the last report (or boot anchor).
    pub report_hour: u8,
    pub stay_awake_since_ms: u64,
    pub stay_awake_ms: u64,
}

/// What Idle should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Stay,
    Nap,
    Report,
    Sleep,
    LowBattery,
}

/// Precedence, highest first: low battery, outside open hours, new hourly
/// period, nap in low-power mode once the stay-awake window has passed.
pub fn evaluate(config: &DeviceConfig, inputs: &ScheduleInputs) -> Decision {
    if inputs.state_of_charge <= inputs.low_battery_limit {
        return Decision::LowBattery;
    }
    let local = LocalTime::at(inputs.now_unix, config.time_zone);
    if !OpenHours::from_config(config).is_open(local.hour) {
        return Decision::Sleep;
    }
    if local.hour != inputs.report_hour {
        return Decision::Report;
    }
    let awake_for = inputs.uptime_ms.saturating_sub(inputs.stay_awake_since_ms);
    if inputs.low_power && awake_for > inputs.stay_awake_ms {
        return Decision::Nap;
    }
    Decision::Stay
}
