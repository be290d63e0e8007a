//! Battery charging profiles.
//!
//! The charger is programmed differently for a small solar panel than for a
//! utility supply, and the low-battery threshold moves with it.

/// Charger limits plus the state-of-charge floor below which the device
/// stops counting and sleeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeProfile {
    /// State of charge (percent) that triggers the LowBattery state.
    pub low_battery_limit: u8,
    /// Input voltage regulation floor (mV).
    pub input_voltage_limit_mv: u16,
    /// Input current limit (mA).
    pub input_current_limit_ma: u16,
    /// Fast-charge current (mA).
    pub charge_current_ma: u16,
    /// Charge termination voltage (mV).
    pub charge_voltage_mv: u16,
}

/// Small panel: hold the input voltage up so the panel stays near its
/// maximum power point and charge gently.
pub const SOLAR: ChargeProfile = ChargeProfile {
    low_battery_limit: 20,
    input_voltage_limit_mv: 4840,
    input_current_limit_ma: 900,
    charge_current_ma: 512,
    charge_voltage_mv: 4208,
};

/// Utility supply: more input current, slightly lower termination voltage
/// for battery life.
pub const UTILITY: ChargeProfile = ChargeProfile {
    low_battery_limit: 30,
    input_voltage_limit_mv: 4208,
    input_current_limit_ma: 1500,
    charge_current_ma: 2048,
    charge_voltage_mv: 4112,
};

impl ChargeProfile {
    pub fn for_mode(solar: bool) -> &'static Self {
        if solar { &SOLAR } else { &UTILITY }
    }
}
