//! Power-monitor adapter: MAX17043 fuel gauge plus BQ24195 charger.
//!
//! Both chips sit on the same I2C bus as the FRAM.  The gauge reports
//! state of charge; the charger is programmed from a [`ChargeProfile`].
//!
//! - **`target_os = "espidf"`**: [`PowerMonitor`] over a shared
//!   `esp-idf-hal` `I2cDriver`.
//! - **`not(target_os = "espidf")`**: [`SimPower`] with a settable charge
//!   level and a record of applied profiles.

use embedded_hal::i2c::I2c;
use log::{info, warn};

use crate::app::ports::PowerPort;
use crate::power::ChargeProfile;

const GAUGE_ADDR: u8 = 0x36;
const GAUGE_REG_SOC: u8 = 0x04;

const CHARGER_ADDR: u8 = 0x6B;
const REG_INPUT_SOURCE: u8 = 0x00;
const REG_CHARGE_CURRENT: u8 = 0x02;
const REG_CHARGE_VOLTAGE: u8 = 0x04;

// BQ24195 field encodings
const VINDPM_BASE_MV: u16 = 3880;
const VINDPM_STEP_MV: u16 = 80;
const ICHG_BASE_MA: u16 = 512;
const ICHG_STEP_MA: u16 = 64;
const VREG_BASE_MV: u16 = 3504;
const VREG_STEP_MV: u16 = 16;
/// IINLIM codes 0..=7, in mA.
const IINLIM_TABLE_MA: [u16; 8] = [100, 150, 500, 900, 1200, 1500, 2000, 3000];

/// REG00 with VINDPM and IINLIM replaced; EN_HIZ kept.
pub fn input_source_bits(current: u8, profile: &ChargeProfile) -> u8 {
    let vindpm = (profile.input_voltage_limit_mv.saturating_sub(VINDPM_BASE_MV) / VINDPM_STEP_MV)
        .min(0x0F) as u8;
    // Highest limit not above the request.
    let iinlim = IINLIM_TABLE_MA
        .iter()
        .rposition(|&ma| ma <= profile.input_current_limit_ma)
        .unwrap_or(0) as u8;
    (current & 0x80) | (vindpm << 3) | iinlim
}

/// REG02 with ICHG replaced.
pub fn charge_current_bits(current: u8, profile: &ChargeProfile) -> u8 {
    let ichg =
        (profile.charge_current_ma.saturating_sub(ICHG_BASE_MA) / ICHG_STEP_MA).min(0x3F) as u8;
    (current & 0x03) | (ichg << 2)
}

/// REG04 with VREG replaced.
pub fn charge_voltage_bits(current: u8, profile: &ChargeProfile) -> u8 {
    let vreg = (profile.charge_voltage_mv.saturating_sub(VREG_BASE_MV) / VREG_STEP_MV).min(0x3F) as u8;
    (current & 0x03) | (vreg << 2)
}

/// Fuel gauge and charger behind one bus handle.
pub struct PowerMonitor<I2C> {
    bus: I2C,
    /// Last good gauge reading.  Full until the gauge first answers.
    last_soc: u8,
}

impl<I2C: I2c> PowerMonitor<I2C> {
    pub fn new(bus: I2C) -> Self {
        Self { bus, last_soc: 100 }
    }

    fn update_charger(&mut self, reg: u8, encode: impl FnOnce(u8) -> u8) -> Result<(), I2C::Error> {
        let mut cur = [0u8; 1];
        self.bus.write_read(CHARGER_ADDR, &[reg], &mut cur)?;
        self.bus.write(CHARGER_ADDR, &[reg, encode(cur[0])])
    }
}

impl<I2C: I2c> PowerPort for PowerMonitor<I2C> {
    fn state_of_charge(&mut self) -> u8 {
        let mut raw = [0u8; 2];
        match self.bus.write_read(GAUGE_ADDR, &[GAUGE_REG_SOC], &mut raw) {
            // High byte is whole percent, low byte 1/256 %.
            Ok(()) => self.last_soc = raw[0].min(100),
            Err(e) => warn!(
                "Fuel gauge read failed: {:?}",
                embedded_hal::i2c::Error::kind(&e)
            ),
        }
        self.last_soc
    }

    fn apply_charge_profile(&mut self, profile: &ChargeProfile) {
        let result = self
            .update_charger(REG_INPUT_SOURCE, |c| input_source_bits(c, profile))
            .and_then(|()| self.update_charger(REG_CHARGE_CURRENT, |c| charge_current_bits(c, profile)))
            .and_then(|()| self.update_charger(REG_CHARGE_VOLTAGE, |c| charge_voltage_bits(c, profile)));
        match result {
            Ok(()) => info!(
                "Charger set: {} mV / {} mA in, {} mA / {} mV charge",
                profile.input_voltage_limit_mv,
                profile.input_current_limit_ma,
                profile.charge_current_ma,
                profile.charge_voltage_mv
            ),
            Err(e) => warn!(
                "Charger configuration failed: {:?}",
                embedded_hal::i2c::Error::kind(&e)
            ),
        }
    }
}

// ── Simulation backend ───────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub use sim::SimPower;

#[cfg(not(target_os = "espidf"))]
mod sim {
    use super::{ChargeProfile, PowerPort};

    #[derive(Debug, Clone)]
    pub struct SimPower {
        soc: u8,
        applied: Vec<ChargeProfile>,
    }

    impl Default for SimPower {
        fn default() -> Self {
            Self::new()
        }
    }

    impl SimPower {
        pub fn new() -> Self {
            Self {
                soc: 80,
                applied: Vec::new(),
            }
        }

        pub fn set_state_of_charge(&mut self, soc: u8) {
            self.soc = soc;
        }

        /// Profiles programmed so far, oldest first.
        pub fn applied(&self) -> &[ChargeProfile] {
            &self.applied
        }
    }

    impl PowerPort for SimPower {
        fn state_of_charge(&mut self) -> u8 {
            self.soc
        }

        fn apply_charge_profile(&mut self, profile: &ChargeProfile) {
            self.applied.push(*profile);
        }
    }
}
