//! GPIO / peripheral pin assignments for the counter main board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Presence sensor module
// ---------------------------------------------------------------------------

/// Digital input: sensor output, rising edge = object arrived.
/// Also the light-sleep wake source (ext0, level high).
pub const SENSOR_INT_GPIO: i32 = 4;
/// Digital output: LOW powers the sensor module, HIGH switches it off.
pub const SENSOR_DISABLE_GPIO: i32 = 5;
/// Digital output: sensor board indicator LED supply.
pub const SENSOR_LED_POWER_GPIO: i32 = 6;

// ---------------------------------------------------------------------------
// External watchdog (TPL5010)
// ---------------------------------------------------------------------------

/// Digital input: WAKE output, rising edge asks for a pet.
pub const WDT_WAKE_GPIO: i32 = 7;
/// Digital output: DONE pulse resets the watchdog interval.
pub const WDT_DONE_GPIO: i32 = 8;

// ---------------------------------------------------------------------------
// Temperature (TMP36)
// ---------------------------------------------------------------------------

/// TMP36 analog output.  ADC1 channel 0 (GPIO 1 on ESP32-S3).
pub const TMP36_ADC_GPIO: i32 = 1;
/// Digital output: HIGH powers the TMP36.
pub const TMP36_SHUTDOWN_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// Cellular modem
// ---------------------------------------------------------------------------

/// Digital output: modem supply enable (active HIGH).
pub const MODEM_POWER_GPIO: i32 = 9;
/// Digital output: modem hardware reset (active HIGH pulse).
pub const MODEM_RESET_GPIO: i32 = 10;
/// Modem UART, MCU transmit.
pub const MODEM_TX_GPIO: i32 = 16;
/// Modem UART, MCU receive.
pub const MODEM_RX_GPIO: i32 = 17;
/// AT channel baud rate.
pub const MODEM_BAUD: u32 = 115_200;

// ---------------------------------------------------------------------------
// User interface
// ---------------------------------------------------------------------------

/// Momentary switch (active-low with pull-up).  Held at boot = rescue.
pub const USER_SWITCH_GPIO: i32 = 11;
/// Activity LED, lit while an event is being recorded.
pub const ACTIVITY_LED_GPIO: i32 = 12;
/// Digital output: HIGH latches the carrier board's power cut, removing
/// supply from every part until the timer restores it.
pub const HARD_RESET_GPIO: i32 = 13;

// ---------------------------------------------------------------------------
// I²C bus (FRAM, fuel gauge, charger)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 14;
pub const I2C_SCL_GPIO: i32 = 15;
/// Bus clock for all three I²C parts.
pub const I2C_FREQ_HZ: u32 = 400_000;
