//! TMP36 analog temperature sensor.
//!
//! 10 mV/°C with a 500 mV offset at 0 °C.  Conversion truncates at each
//! step, first to whole °C, then to whole °F.

/// Whole degrees Fahrenheit for a pin voltage in millivolts.
pub fn fahrenheit_from_millivolts(mv: u32) -> i16 {
    let celsius = (mv as i32 - 500) / 10;
    (celsius as f32 * 9.0 / 5.0 + 32.0) as i16
}
