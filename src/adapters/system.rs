//! Sleep / reset controller adapter.
//!
//! - **`target_os = "espidf"`**: light sleep with ext0 (sensor line) and
//!   timer wake, timed deep sleep, `esp_restart()`, and the boot reset
//!   reason.  Delays go through FreeRTOS (ms) or the ROM busy-wait (µs).
//! - **`not(target_os = "espidf")`**: [`SimSleep`] records each call and
//!   moves [`SimTime`](super::time::SimTime) instead of sleeping.  Deep
//!   sleep and restart return; the caller re-enters initialization the way
//!   the real device does after reboot.

use embedded_hal::delay::DelayNs;

use crate::app::ports::{ResetReason, SleepPort, WakeSource};

// ── ESP-IDF backend ───────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct SleepController;

#[cfg(target_os = "espidf")]
impl SleepController {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "espidf")]
impl DelayNs for SleepController {
    fn delay_ns(&mut self, ns: u32) {
        esp_idf_hal::delay::Ets::delay_us(ns.div_ceil(1_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }
}

#[cfg(target_os = "espidf")]
#[allow(non_upper_case_globals)]
impl SleepPort for SleepController {
    fn reset_reason(&self) -> ResetReason {
        use esp_idf_svc::sys::*;
        // SAFETY: read-only query of the boot-time reset cause.
        match unsafe { esp_reset_reason() } {
            esp_reset_reason_t_ESP_RST_POWERON => ResetReason::PowerOn,
            esp_reset_reason_t_ESP_RST_INT_WDT
            | esp_reset_reason_t_ESP_RST_TASK_WDT
            | esp_reset_reason_t_ESP_RST_WDT => ResetReason::Watchdog,
            esp_reset_reason_t_ESP_RST_EXT => ResetReason::PinReset,
            esp_reset_reason_t_ESP_RST_SW | esp_reset_reason_t_ESP_RST_PANIC => {
                ResetReason::Software
            }
            esp_reset_reason_t_ESP_RST_DEEPSLEEP => ResetReason::DeepSleepWake,
            _ => ResetReason::Unknown,
        }
    }

    fn nap(&mut self, max_secs: u32) -> WakeSource {
        use esp_idf_svc::sys::*;
        // SAFETY: wake sources are configured immediately before sleeping
        // from the single control task.
        let cause = unsafe {
            esp_sleep_enable_timer_wakeup(u64::from(max_secs) * 1_000_000);
            esp_sleep_enable_ext0_wakeup(crate::pins::SENSOR_INT_GPIO, 1);
            esp_light_sleep_start();
            esp_sleep_get_wakeup_cause()
        };
        match cause {
            esp_sleep_source_t_ESP_SLEEP_WAKEUP_EXT0 => WakeSource::Sensor,
            esp_sleep_source_t_ESP_SLEEP_WAKEUP_TIMER => WakeSource::Timer,
            _ => WakeSource::Other,
        }
    }

    fn deep_sleep(&mut self, secs: u32) {
        log::info!("Deep sleep for {} s", secs);
        // SAFETY: does not return; the next run starts from boot.
        unsafe { esp_idf_svc::sys::esp_deep_sleep(u64::from(secs) * 1_000_000) }
    }

    fn restart(&mut self) {
        // SAFETY: does not return.
        unsafe { esp_idf_svc::sys::esp_restart() }
    }
}

// ── Simulation backend ───────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub use sim::{SimSleep, SystemCall};

#[cfg(not(target_os = "espidf"))]
mod sim {
    use super::{DelayNs, ResetReason, SleepPort, WakeSource};
    use crate::adapters::time::SimTime;

    /// Suspensions and resets, in call order.  Plain delays are not
    /// recorded; they only advance time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SystemCall {
        Nap(u32),
        DeepSleep(u32),
        Restart,
    }

    pub struct SimSleep {
        time: SimTime,
        calls: Vec<SystemCall>,
        reset_reason: ResetReason,
        sensor_wake_after_ms: Option<u64>,
    }

    impl SimSleep {
        pub fn new(time: SimTime) -> Self {
            Self {
                time,
                calls: Vec::new(),
                reset_reason: ResetReason::PowerOn,
                sensor_wake_after_ms: None,
            }
        }

        pub fn calls(&self) -> &[SystemCall] {
            &self.calls
        }

        pub fn clear_calls(&mut self) {
            self.calls.clear();
        }

        /// Reset cause the next boot will report.
        pub fn set_reset_reason(&mut self, reason: ResetReason) {
            self.reset_reason = reason;
        }

        /// The next nap ends on a sensor edge after `after_ms`.
        pub fn wake_next_nap_on_sensor(&mut self, after_ms: u64) {
            self.sensor_wake_after_ms = Some(after_ms);
        }

        pub fn restarts(&self) -> usize {
            self.calls.iter().filter(|c| **c == SystemCall::Restart).count()
        }
    }

    impl DelayNs for SimSleep {
        fn delay_ns(&mut self, ns: u32) {
            self.time.advance_ms(u64::from(ns).div_ceil(1_000_000));
        }

        fn delay_us(&mut self, us: u32) {
            self.time.advance_ms(u64::from(us).div_ceil(1_000));
        }

        fn delay_ms(&mut self, ms: u32) {
            self.time.advance_ms(u64::from(ms));
        }
    }

    impl SleepPort for SimSleep {
        fn reset_reason(&self) -> ResetReason {
            self.reset_reason
        }

        fn nap(&mut self, max_secs: u32) -> WakeSource {
            self.calls.push(SystemCall::Nap(max_secs));
            let limit = u64::from(max_secs) * 1_000;
            match self.sensor_wake_after_ms.take() {
                Some(after) => {
                    self.time.advance_ms(after.min(limit));
                    WakeSource::Sensor
                }
                None => {
                    self.time.advance_ms(limit);
                    WakeSource::Timer
                }
            }
        }

        fn deep_sleep(&mut self, secs: u32) {
            self.calls.push(SystemCall::DeepSleep(secs));
            self.time.advance_ms(u64::from(secs) * 1_000);
            self.time.reboot();
            self.reset_reason = ResetReason::DeepSleepWake;
        }

        fn restart(&mut self) {
            self.calls.push(SystemCall::Restart);
            self.time.reboot();
            self.reset_reason = ResetReason::Software;
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn deep_sleep_reboots_the_clock() {
            let time = SimTime::new();
            time.advance_ms(5_000);
            let start = time.now_unix();
            let mut sys = SimSleep::new(time.clone());
            sys.deep_sleep(60);
            assert_eq!(time.now_unix(), start + 60);
            assert_eq!(time.uptime_ms(), 0);
            assert_eq!(sys.reset_reason(), ResetReason::DeepSleepWake);
        }

        #[test]
        fn nap_wakes_on_scripted_edge() {
            let time = SimTime::new();
            let mut sys = SimSleep::new(time.clone());
            sys.wake_next_nap_on_sensor(2_000);
            assert_eq!(sys.nap(600), WakeSource::Sensor);
            assert_eq!(time.uptime_ms(), 2_000);
            assert_eq!(sys.nap(1), WakeSource::Timer);
            assert_eq!(time.uptime_ms(), 3_000);
        }
    }
}
