//! Persistent register model.
//!
//! Fixed byte layout in the non-volatile store, the control-flag bitfield,
//! and [`Registers`], the in-memory mirror the FSM works against.  Every
//! mutation goes through a `store_*` / `update_*` method that writes the
//! register before returning, so the store is never behind the mirror.
//!
//! ```text
//!  0x00  version        u8     0x07  control        u8
//!  0x02  debounce (ds)  u8     0x08  hourly count   u16
//!  0x03  reset count    u8     0x0C  daily count    u16
//!  0x04  time zone      i8     0x0E  last event     u32 (unix s)
//!  0x05  open hour      u8     0x12  alert count    u8
//!  0x06  close hour     u8     0x13  max per minute u8
//! ```

use log::{info, warn};

use crate::app::ports::RegisterStore;
use crate::config::DeviceConfig;
use crate::error::StorageError;

/// Register offsets.
pub mod layout {
    pub const VERSION: u16 = 0x00;
    pub const DEBOUNCE: u16 = 0x02;
    pub const RESET_COUNT: u16 = 0x03;
    pub const TIME_ZONE: u16 = 0x04;
    pub const OPEN_HOUR: u16 = 0x05;
    pub const CLOSE_HOUR: u16 = 0x06;
    pub const CONTROL: u16 = 0x07;
    pub const HOURLY_COUNT: u16 = 0x08;
    pub const DAILY_COUNT: u16 = 0x0C;
    pub const LAST_EVENT: u16 = 0x0E;
    pub const ALERT_COUNT: u16 = 0x12;
    pub const MAX_PER_MINUTE: u16 = 0x13;
    /// One past the last register.
    pub const END: u16 = 0x14;
}

/// Layout revision this firmware understands.
pub const SCHEMA_VERSION: u8 = 9;

// ---------------------------------------------------------------------------
// Control register
// ---------------------------------------------------------------------------

/// Decoded control register.
///
/// Bits outside the four known flags are carried through unchanged so a
/// read-modify-write never clobbers them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlFlags {
    pub low_power: bool,
    pub solar_power: bool,
    pub verbose: bool,
    /// The cellular link is intentionally kept up.
    pub connection: bool,
    reserved: u8,
}

impl ControlFlags {
    const LOW_POWER: u8 = 1 << 0;
    const SOLAR_POWER: u8 = 1 << 2;
    const VERBOSE: u8 = 1 << 3;
    const CONNECTION: u8 = 1 << 4;
    const KNOWN: u8 = Self::LOW_POWER | Self::SOLAR_POWER | Self::VERBOSE | Self::CONNECTION;

    pub fn decode(byte: u8) -> Self {
        Self {
            low_power: byte & Self::LOW_POWER != 0,
            solar_power: byte & Self::SOLAR_POWER != 0,
            verbose: byte & Self::VERBOSE != 0,
            connection: byte & Self::CONNECTION != 0,
            reserved: byte & !Self::KNOWN,
        }
    }

    pub fn encode(self) -> u8 {
        let mut byte = self.reserved;
        if self.low_power {
            byte |= Self::LOW_POWER;
        }
        if self.solar_power {
            byte |= Self::SOLAR_POWER;
        }
        if self.verbose {
            byte |= Self::VERBOSE;
        }
        if self.connection {
            byte |= Self::CONNECTION;
        }
        byte
    }
}

// ---------------------------------------------------------------------------
// In-memory mirror
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub config: DeviceConfig,
    pub flags: ControlFlags,
    pub hourly: u16,
    pub daily: u16,
    /// Unix seconds of the last accepted event.
    pub last_event: u32,
    pub reset_count: u8,
    pub alert_count: u8,
}

impl Registers {
    /// Check the schema byte.  On mismatch, rewrite the whole layout with
    /// defaults and check again.
    pub fn ensure_schema(store: &mut dyn RegisterStore) -> Result<(), StorageError> {
        let found = store.read_u8(layout::VERSION)?;
        if found == SCHEMA_VERSION {
            return Ok(());
        }
        warn!("Register schema {} != {}, resetting layout", found, SCHEMA_VERSION);
        Self::reset_store(store)?;
        let found = store.read_u8(layout::VERSION)?;
        if found == SCHEMA_VERSION {
            Ok(())
        } else {
            Err(StorageError::SchemaMismatch { found })
        }
    }

    /// Zero the layout, write default configuration and stamp the schema.
    pub fn reset_store(store: &mut dyn RegisterStore) -> Result<(), StorageError> {
        let blank = [0u8; layout::END as usize];
        store.write(0, &blank)?;
        let defaults = Self::default();
        defaults.store_config(store)?;
        store.write_u8(layout::VERSION, SCHEMA_VERSION)?;
        info!("Register store reset to defaults");
        Ok(())
    }

    /// Read every register.  Out-of-range configuration is replaced with its
    /// default and the corrected value written back.
    pub fn load(store: &mut dyn RegisterStore) -> Result<Self, StorageError> {
        let stored = DeviceConfig {
            open_hour: store.read_u8(layout::OPEN_HOUR)?,
            close_hour: store.read_u8(layout::CLOSE_HOUR)?,
            time_zone: store.read_u8(layout::TIME_ZONE)? as i8,
            debounce_ds: store.read_u8(layout::DEBOUNCE)?,
            max_per_minute: store.read_u8(layout::MAX_PER_MINUTE)?,
        };
        let config = stored.sanitized();
        let regs = Self {
            config,
            flags: ControlFlags::decode(store.read_u8(layout::CONTROL)?),
            hourly: store.read_u16(layout::HOURLY_COUNT)?,
            daily: store.read_u16(layout::DAILY_COUNT)?,
            last_event: store.read_u32(layout::LAST_EVENT)?,
            reset_count: store.read_u8(layout::RESET_COUNT)?,
            alert_count: store.read_u8(layout::ALERT_COUNT)?,
        };
        if config != stored {
            warn!("Stored configuration out of range, writing back defaults for bad fields");
            regs.store_config(store)?;
        }
        Ok(regs)
    }

    pub fn store_config(&self, store: &mut dyn RegisterStore) -> Result<(), StorageError> {
        let c = &self.config;
        store.write_u8(layout::OPEN_HOUR, c.open_hour)?;
        store.write_u8(layout::CLOSE_HOUR, c.close_hour)?;
        store.write_u8(layout::TIME_ZONE, c.time_zone as u8)?;
        store.write_u8(layout::DEBOUNCE, c.debounce_ds)?;
        store.write_u8(layout::MAX_PER_MINUTE, c.max_per_minute)
    }

    /// Read-modify-write of the control register.  Starts from the stored
    /// byte, not the mirror; only the fields `change` touches differ.
    pub fn update_flags(
        &mut self,
        store: &mut dyn RegisterStore,
        change: impl FnOnce(&mut ControlFlags),
    ) -> Result<ControlFlags, StorageError> {
        let mut flags = ControlFlags::decode(store.read_u8(layout::CONTROL)?);
        change(&mut flags);
        store.write_u8(layout::CONTROL, flags.encode())?;
        self.flags = flags;
        Ok(flags)
    }

    pub fn store_hourly(&self, store: &mut dyn RegisterStore) -> Result<(), StorageError> {
        store.write_u16(layout::HOURLY_COUNT, self.hourly)
    }

    pub fn store_daily(&self, store: &mut dyn RegisterStore) -> Result<(), StorageError> {
        store.write_u16(layout::DAILY_COUNT, self.daily)
    }

    pub fn store_last_event(&self, store: &mut dyn RegisterStore) -> Result<(), StorageError> {
        store.write_u32(layout::LAST_EVENT, self.last_event)
    }

    /// Both counters in one call.
    pub fn store_counts(&self, store: &mut dyn RegisterStore) -> Result<(), StorageError> {
        self.store_hourly(store)?;
        self.store_daily(store)
    }

    pub fn store_reset_count(&self, store: &mut dyn RegisterStore) -> Result<(), StorageError> {
        store.write_u8(layout::RESET_COUNT, self.reset_count)
    }

    pub fn store_alert_count(&self, store: &mut dyn RegisterStore) -> Result<(), StorageError> {
        store.write_u8(layout::ALERT_COUNT, self.alert_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fram::MemoryStore;

    fn fresh_store() -> MemoryStore {
        let mut store = MemoryStore::new_sim();
        Registers::reset_store(&mut store).unwrap();
        store
    }

    #[test]
    fn flags_roundtrip_preserves_reserved_bits() {
        let byte = 0b1110_0010 | ControlFlags::VERBOSE;
        let flags = ControlFlags::decode(byte);
        assert!(flags.verbose);
        assert!(!flags.low_power);
        assert_eq!(flags.encode(), byte);
    }

    #[test]
    fn blank_store_is_reset_on_schema_check() {
        let mut store = MemoryStore::new_sim();
        Registers::ensure_schema(&mut store).unwrap();
        assert_eq!(store.read_u8(layout::VERSION).unwrap(), SCHEMA_VERSION);
        let regs = Registers::load(&mut store).unwrap();
        assert_eq!(regs.config, DeviceConfig::default());
        assert_eq!(regs.hourly, 0);
    }

    #[test]
    fn schema_check_fails_when_store_will_not_hold() {
        let mut store = MemoryStore::new_sim();
        store.set_write_protect(true);
        let err = Registers::ensure_schema(&mut store).unwrap_err();
        assert_eq!(err, StorageError::SchemaMismatch { found: 0 });
    }

    #[test]
    fn load_sanitises_and_writes_back() {
        let mut store = fresh_store();
        store.write_u8(layout::TIME_ZONE, 100).unwrap();
        store.write_u8(layout::OPEN_HOUR, 7).unwrap();
        let regs = Registers::load(&mut store).unwrap();
        assert_eq!(regs.config.time_zone, -5);
        assert_eq!(regs.config.open_hour, 7);
        assert_eq!(store.read_u8(layout::TIME_ZONE).unwrap() as i8, -5);
    }

    #[test]
    fn update_flags_changes_only_named_bit() {
        let mut store = fresh_store();
        store.write_u8(layout::CONTROL, 0b0100_1000).unwrap();
        let mut regs = Registers::load(&mut store).unwrap();
        regs.update_flags(&mut store, |f| f.low_power = true).unwrap();
        assert_eq!(store.read_u8(layout::CONTROL).unwrap(), 0b0100_1001);
        assert!(regs.flags.verbose && regs.flags.low_power);
    }

    #[test]
    fn counts_are_little_endian_u16() {
        let mut store = fresh_store();
        let regs = Registers {
            hourly: 0x0102,
            daily: 0x0304,
            ..Registers::default()
        };
        regs.store_counts(&mut store).unwrap();
        let mut raw = [0u8; 2];
        store.read(layout::HOURLY_COUNT, &mut raw).unwrap();
        assert_eq!(raw, [0x02, 0x01]);
        assert_eq!(Registers::load(&mut store).unwrap().daily, 0x0304);
    }
}
