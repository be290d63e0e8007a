//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (register store, cellular link, power monitor, clock,
//! board I/O, sleep controller, event sinks) implement these traits.  The
//! FSM handlers receive them bundled in [`Ports`], so the domain core never
//! touches hardware directly and the whole engine runs on the host.

use embedded_hal::delay::DelayNs;

use crate::error::{CommsError, StorageError};
use crate::power::ChargeProfile;

// ───────────────────────────────────────────────────────────────
// Register store (driven adapter: domain ↔ FRAM)
// ───────────────────────────────────────────────────────────────

/// Byte-addressed non-volatile store holding the register layout.
///
/// Every write is durable when the call returns; callers rely on that to
/// keep the persisted counters ahead of any reset.  Multi-byte values are
/// little-endian.
pub trait RegisterStore {
    /// Probe the device.  Fails with [`StorageError::Absent`] if it does
    /// not answer.
    fn begin(&mut self) -> Result<(), StorageError>;

    /// Read `buf.len()` bytes starting at `offset`.
    fn read(&mut self, offset: u16, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Write `data` starting at `offset`.
    fn write(&mut self, offset: u16, data: &[u8]) -> Result<(), StorageError>;

    fn read_u8(&mut self, offset: u16) -> Result<u8, StorageError> {
        let mut b = [0u8; 1];
        self.read(offset, &mut b)?;
        Ok(b[0])
    }

    fn read_u16(&mut self, offset: u16) -> Result<u16, StorageError> {
        let mut b = [0u8; 2];
        self.read(offset, &mut b)?;
        Ok(u16::from_le_bytes(b))
    }

    fn read_u32(&mut self, offset: u16) -> Result<u32, StorageError> {
        let mut b = [0u8; 4];
        self.read(offset, &mut b)?;
        Ok(u32::from_le_bytes(b))
    }

    fn write_u8(&mut self, offset: u16, value: u8) -> Result<(), StorageError> {
        self.write(offset, &[value])
    }

    fn write_u16(&mut self, offset: u16, value: u16) -> Result<(), StorageError> {
        self.write(offset, &value.to_le_bytes())
    }

    fn write_u32(&mut self, offset: u16, value: u32) -> Result<(), StorageError> {
        self.write(offset, &value.to_le_bytes())
    }
}

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: domain ↔ cellular cloud link)
// ───────────────────────────────────────────────────────────────

/// Maximum topic length carried by an [`InboundMessage`].
pub const TOPIC_CAP: usize = 64;
/// Maximum payload length carried by an [`InboundMessage`].
pub const PAYLOAD_CAP: usize = 64;

/// A message delivered by the cloud to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: heapless::String<TOPIC_CAP>,
    pub payload: heapless::String<PAYLOAD_CAP>,
}

impl InboundMessage {
    /// Build a message, truncating fields that exceed capacity.
    pub fn new(topic: &str, payload: &str) -> Self {
        Self {
            topic: truncated(topic),
            payload: truncated(payload),
        }
    }
}

fn truncated<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for ch in s.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

/// Cellular radio plus cloud publish/subscribe.
pub trait TransportPort {
    /// Power the modem up.
    fn power_on(&mut self);

    /// Power the modem down (the link must already be disconnected).
    fn power_off(&mut self);

    /// Bring the cloud session up, blocking for at most `timeout_ms`.
    fn connect(&mut self, timeout_ms: u32) -> Result<(), CommsError>;

    /// Drop the cloud session.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Publish `payload` under `topic` (private, acknowledged delivery).
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), CommsError>;

    /// Next message the cloud delivered since the last poll, if any.
    fn poll_message(&mut self) -> Option<InboundMessage>;

    /// Received signal strength in dBm while connected.
    fn rssi_dbm(&mut self) -> Option<i16>;

    /// Issue the modem's silent-reset command.
    fn reset_modem(&mut self) -> Result<(), CommsError>;
}

// ───────────────────────────────────────────────────────────────
// Power port (driven adapter: domain ↔ fuel gauge + charger)
// ───────────────────────────────────────────────────────────────

pub trait PowerPort {
    /// Battery state of charge, percent (0-100).
    fn state_of_charge(&mut self) -> u8;

    /// Program the charger with the given limits.
    fn apply_charge_profile(&mut self, profile: &ChargeProfile);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

pub trait Clock {
    /// Wall-clock time, unix seconds (UTC).
    fn now_unix(&self) -> i64;

    /// Monotonic milliseconds since boot.
    fn uptime_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Board port (driven adapter: domain ↔ GPIO / analog)
// ───────────────────────────────────────────────────────────────

/// Discrete board I/O.  Interrupt-side flags are exposed through the
/// `take_*` methods so ISR state never leaks into the domain.
pub trait BoardPort {
    /// Consume the "sensor edge seen" flag.
    fn take_sensor_event(&mut self) -> bool;

    /// Consume the "external watchdog wants a pet" flag.
    fn take_watchdog_request(&mut self) -> bool;

    /// Pulse the external watchdog's done line.
    fn pet_watchdog(&mut self);

    /// Power the sensor module and arm (or disarm) its interrupt.
    fn set_sensing(&mut self, enabled: bool);

    /// Current level of the sensor line (true = object present).
    fn sensor_active(&self) -> bool;

    /// Whether the user switch is held down.
    fn user_switch_pressed(&self) -> bool;

    /// Blink or hold the activity LED.
    fn set_activity_led(&mut self, on: bool);

    /// Board temperature, whole degrees Fahrenheit.
    fn temperature_f(&mut self) -> i16;

    /// Drop the board's peripheral rails to their minimum for sleep.
    fn enter_low_power(&mut self);

    /// Cut power to the whole board.  On hardware this does not return.
    fn cut_power(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Sleep / reset controller
// ───────────────────────────────────────────────────────────────

/// Platform reset cause reported at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    PowerOn,
    /// Hardware or task watchdog fired.
    Watchdog,
    /// External reset pin.
    PinReset,
    /// Firmware requested restart.
    Software,
    DeepSleepWake,
    Unknown,
}

impl ResetReason {
    /// Whether this reset counts toward the escalation ceiling.
    pub fn is_unplanned(self) -> bool {
        matches!(self, Self::Watchdog | Self::PinReset | Self::Software)
    }
}

/// What ended a nap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeSource {
    Sensor,
    Timer,
    Other,
}

/// Blocking delays, light and deep sleep, and restart.
pub trait SleepPort: DelayNs {
    fn reset_reason(&self) -> ResetReason;

    /// Light sleep for at most `max_secs`, waking early on the sensor line.
    fn nap(&mut self, max_secs: u32) -> WakeSource;

    /// Deep sleep for `secs`.  On hardware this does not return; the next
    /// run starts from boot.
    fn deep_sleep(&mut self, secs: u32);

    /// Software restart.  On hardware this does not return.
    fn restart(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Bundle handed to FSM handlers
// ───────────────────────────────────────────────────────────────

/// Every driven port the FSM needs, borrowed for one tick.
pub struct Ports<'a> {
    pub store: &'a mut dyn RegisterStore,
    pub link: &'a mut dyn TransportPort,
    pub power: &'a mut dyn PowerPort,
    pub clock: &'a dyn Clock,
    pub board: &'a mut dyn BoardPort,
    pub system: &'a mut dyn SleepPort,
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
