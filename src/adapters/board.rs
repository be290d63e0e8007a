//! Board I/O adapter: sensor module, external watchdog, user switch,
//! activity LED, and the TMP36.
//!
//! - **`target_os = "espidf"`**: GPIO/ADC through [`drivers::hw_init`],
//!   interrupt flags from [`events`](crate::events).
//! - **`not(target_os = "espidf")`**: [`SimBoard`] with per-instance flags
//!   and settable inputs.
//!
//! [`drivers::hw_init`]: crate::drivers::hw_init

use crate::app::ports::BoardPort;
use crate::drivers::watchdog::ExternalWatchdog;

// ── ESP-IDF backend ───────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct Board {
    watchdog: ExternalWatchdog,
}

#[cfg(target_os = "espidf")]
impl Board {
    /// Call after `hw_init::init_peripherals()` and `init_isr_service()`.
    pub fn new() -> Self {
        Self {
            watchdog: ExternalWatchdog::new(),
        }
    }
}

#[cfg(target_os = "espidf")]
impl BoardPort for Board {
    fn take_sensor_event(&mut self) -> bool {
        crate::events::SENSOR_EDGE.take()
    }

    fn take_watchdog_request(&mut self) -> bool {
        crate::events::WATCHDOG_KICK.take()
    }

    fn pet_watchdog(&mut self) {
        self.watchdog.pet();
    }

    fn set_sensing(&mut self, enabled: bool) {
        use crate::drivers::hw_init::{gpio_write, set_sensor_interrupt};
        use crate::pins;
        set_sensor_interrupt(enabled);
        gpio_write(pins::SENSOR_DISABLE_GPIO, !enabled);
        gpio_write(pins::SENSOR_LED_POWER_GPIO, enabled);
        if !enabled {
            crate::events::SENSOR_EDGE.take();
        }
    }

    fn sensor_active(&self) -> bool {
        crate::drivers::hw_init::gpio_read(crate::pins::SENSOR_INT_GPIO)
    }

    fn user_switch_pressed(&self) -> bool {
        !crate::drivers::hw_init::gpio_read(crate::pins::USER_SWITCH_GPIO)
    }

    fn set_activity_led(&mut self, on: bool) {
        crate::drivers::hw_init::gpio_write(crate::pins::ACTIVITY_LED_GPIO, on);
    }

    fn temperature_f(&mut self) -> i16 {
        use crate::drivers::hw_init::{ADC1_CH_TMP36, adc1_read, raw_to_millivolts};
        let mv = raw_to_millivolts(adc1_read(ADC1_CH_TMP36));
        crate::drivers::tmp36::fahrenheit_from_millivolts(mv)
    }

    fn enter_low_power(&mut self) {
        use crate::drivers::hw_init::gpio_write;
        use crate::pins;
        gpio_write(pins::ACTIVITY_LED_GPIO, false);
        gpio_write(pins::TMP36_SHUTDOWN_GPIO, false);
    }

    fn cut_power(&mut self) {
        log::warn!("Hard reset: cutting board power");
        crate::drivers::hw_init::gpio_write(crate::pins::HARD_RESET_GPIO, true);
    }
}

// ── Simulation backend ───────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub struct SimBoard {
    sensor_edge: crate::events::IsrFlag,
    watchdog_kick: crate::events::IsrFlag,
    watchdog: ExternalWatchdog,
    sensing: bool,
    sensor_level: bool,
    switch_pressed: bool,
    led: bool,
    temperature_f: i16,
    low_power_entries: u32,
    power_cuts: u32,
}

#[cfg(not(target_os = "espidf"))]
impl Default for SimBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl SimBoard {
    pub fn new() -> Self {
        Self {
            sensor_edge: crate::events::IsrFlag::new(),
            watchdog_kick: crate::events::IsrFlag::new(),
            watchdog: ExternalWatchdog::new(),
            sensing: false,
            sensor_level: false,
            switch_pressed: false,
            led: false,
            temperature_f: 70,
            low_power_entries: 0,
            power_cuts: 0,
        }
    }

    /// An edge reached the sensor ISR.
    pub fn trigger_sensor(&self) {
        self.sensor_edge.raise();
    }

    pub fn sensor_pending(&self) -> bool {
        self.sensor_edge.peek()
    }

    /// The watchdog's WAKE edge reached its ISR.
    pub fn request_watchdog_pet(&self) {
        self.watchdog_kick.raise();
    }

    pub fn watchdog_pets(&self) -> u32 {
        self.watchdog.pets()
    }

    pub fn is_sensing(&self) -> bool {
        self.sensing
    }

    pub fn set_sensor_level(&mut self, high: bool) {
        self.sensor_level = high;
    }

    pub fn press_switch(&mut self, pressed: bool) {
        self.switch_pressed = pressed;
    }

    pub fn set_temperature_f(&mut self, f: i16) {
        self.temperature_f = f;
    }

    pub fn led_on(&self) -> bool {
        self.led
    }

    pub fn low_power_entries(&self) -> u32 {
        self.low_power_entries
    }

    pub fn power_cuts(&self) -> u32 {
        self.power_cuts
    }
}

#[cfg(not(target_os = "espidf"))]
impl BoardPort for SimBoard {
    fn take_sensor_event(&mut self) -> bool {
        self.sensor_edge.take()
    }

    fn take_watchdog_request(&mut self) -> bool {
        self.watchdog_kick.take()
    }

    fn pet_watchdog(&mut self) {
        self.watchdog.pet();
    }

    fn set_sensing(&mut self, enabled: bool) {
        self.sensing = enabled;
        if !enabled {
            self.sensor_edge.take();
        }
    }

    fn sensor_active(&self) -> bool {
        self.sensor_level
    }

    fn user_switch_pressed(&self) -> bool {
        self.switch_pressed
    }

    fn set_activity_led(&mut self, on: bool) {
        self.led = on;
    }

    fn temperature_f(&mut self) -> i16 {
        self.temperature_f
    }

    fn enter_low_power(&mut self) {
        self.led = false;
        self.low_power_entries += 1;
    }

    fn cut_power(&mut self) {
        self.power_cuts += 1;
    }
}
