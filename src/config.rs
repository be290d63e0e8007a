//! Device configuration parameters
//!
//! Operator-tunable settings for the counter.  The authoritative copy lives
//! in the register store; this struct is the in-memory mirror.  Values are
//! range-checked on the way in (operator console) and sanitised on the way
//! out of storage so an invalid value never survives a boot.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Compiled-in timing and policy constants.
pub mod timing {
    /// Scheduled wakes are aligned to this boundary (one hour).
    pub const WAKE_BOUNDARY_SECS: u32 = 3600;
    /// Stay awake this long after boot or an acknowledged report.
    pub const STAY_AWAKE_LONG_MS: u64 = 90_000;
    /// Give up on an acknowledgment after this long.
    pub const ACK_WAIT_MS: u64 = 45_000;
    /// Dwell in Error before recovering.
    pub const ERROR_COOLDOWN_MS: u64 = 30_000;
    /// Settle time after publishing the error notice.
    pub const ERROR_NOTICE_SETTLE_MS: u32 = 2_000;
    /// Cellular connect timeout.
    pub const CONNECT_TIMEOUT_MS: u32 = 60_000;
    /// Wait this long for the link to drop before resetting the modem.
    pub const DISCONNECT_WAIT_MS: u64 = 15_000;
    /// Deep-sleep duration after a modem reset.
    pub const MODEM_RESET_SLEEP_SECS: u32 = 10;
    /// Settle time after powering the modem down.
    pub const MODEM_POWER_DOWN_SETTLE_MS: u32 = 1_000;
    /// Consecutive unplanned resets tolerated before a modem-level reset.
    pub const ESCALATION_CEILING: u8 = 4;
    /// Busy-wait granularity while holding off a debounced sensor.
    pub const DEBOUNCE_POLL_MS: u32 = 10;
    /// Sustained publish budget for notices (messages per second).
    pub const NOTICE_RATE_PER_SEC: u64 = 1;
    /// Notice burst capacity.
    pub const NOTICE_BURST: u64 = 4;
}

// ---------------------------------------------------------------------------
// Ranges
// ---------------------------------------------------------------------------

const HOUR_MAX: u8 = 23;
const TIME_ZONE_MIN: i8 = -12;
const TIME_ZONE_MAX: i8 = 12;
/// Debounce bounds in deciseconds (0.2 s – 5.0 s).
const DEBOUNCE_MIN_DS: u8 = 2;
const DEBOUNCE_MAX_DS: u8 = 50;
const MAX_PER_MINUTE_MIN: u8 = 2;
const MAX_PER_MINUTE_MAX: u8 = 30;

const DEFAULT_TIME_ZONE: i8 = -5;
const DEFAULT_DEBOUNCE_DS: u8 = 5;
const DEFAULT_MAX_PER_MINUTE: u8 = 10;

/// Operator-tunable device configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Local hour at which counting starts (0-23).
    pub open_hour: u8,
    /// Local hour at which counting stops (0-23).  Equal to `open_hour`
    /// means open around the clock.
    pub close_hour: u8,
    /// Whole-hour offset from UTC.
    pub time_zone: i8,
    /// Minimum spacing between accepted events, in tenths of a second.
    pub debounce_ds: u8,
    /// Events per minute that mark a burst as an anomaly.
    pub max_per_minute: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            open_hour: 0,
            close_hour: 0,
            time_zone: DEFAULT_TIME_ZONE,
            debounce_ds: DEFAULT_DEBOUNCE_DS,
            max_per_minute: DEFAULT_MAX_PER_MINUTE,
        }
    }
}

impl DeviceConfig {
    /// Debounce interval in milliseconds.
    pub fn debounce_ms(&self) -> u64 {
        u64::from(self.debounce_ds) * 100
    }

    /// Replace each out-of-range field with its default, leaving valid
    /// fields untouched.
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        Self {
            open_hour: if self.open_hour <= HOUR_MAX { self.open_hour } else { d.open_hour },
            close_hour: if self.close_hour <= HOUR_MAX { self.close_hour } else { d.close_hour },
            time_zone: if (TIME_ZONE_MIN..=TIME_ZONE_MAX).contains(&self.time_zone) {
                self.time_zone
            } else {
                d.time_zone
            },
            debounce_ds: if (DEBOUNCE_MIN_DS..=DEBOUNCE_MAX_DS).contains(&self.debounce_ds) {
                self.debounce_ds
            } else {
                d.debounce_ds
            },
            max_per_minute: if (MAX_PER_MINUTE_MIN..=MAX_PER_MINUTE_MAX)
                .contains(&self.max_per_minute)
            {
                self.max_per_minute
            } else {
                d.max_per_minute
            },
        }
    }

    /// Whether every field is inside its range.
    pub fn is_valid(&self) -> bool {
        self.sanitized() == *self
    }
}

// ---------------------------------------------------------------------------
// Operator input validation
// ---------------------------------------------------------------------------

pub fn validate_open_hour(value: i32) -> Result<u8, ConfigError> {
    validate_hour(value).ok_or(ConfigError::ValidationFailed("open hour must be 0..=23"))
}

pub fn validate_close_hour(value: i32) -> Result<u8, ConfigError> {
    validate_hour(value).ok_or(ConfigError::ValidationFailed("close hour must be 0..=23"))
}

fn validate_hour(value: i32) -> Option<u8> {
    u8::try_from(value).ok().filter(|h| *h <= HOUR_MAX)
}

pub fn validate_time_zone(value: i32) -> Result<i8, ConfigError> {
    i8::try_from(value)
        .ok()
        .filter(|tz| (TIME_ZONE_MIN..=TIME_ZONE_MAX).contains(tz))
        .ok_or(ConfigError::ValidationFailed("time zone must be -12..=12"))
}

/// Convert a debounce in seconds to stored deciseconds.
pub fn validate_debounce_secs(secs: f32) -> Result<u8, ConfigError> {
    if !secs.is_finite() {
        return Err(ConfigError::ValidationFailed("debounce must be a number"));
    }
    let ds = (secs * 10.0).round();
    if ds < f32::from(DEBOUNCE_MIN_DS) || ds > f32::from(DEBOUNCE_MAX_DS) {
        return Err(ConfigError::ValidationFailed("debounce must be 0.2..=5.0 s"));
    }
    Ok(ds as u8)
}

pub fn validate_max_per_minute(value: i32) -> Result<u8, ConfigError> {
    u8::try_from(value)
        .ok()
        .filter(|m| (MAX_PER_MINUTE_MIN..=MAX_PER_MINUTE_MAX).contains(m))
        .ok_or(ConfigError::ValidationFailed("max per minute must be 2..=30"))
}
