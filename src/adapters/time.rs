//! Clock adapter.
//!
//! - **`target_os = "espidf"`**: wall clock from `gettimeofday()` (set by
//!   the modem's network time), uptime from `esp_timer_get_time()`.
//! - **`not(target_os = "espidf")`**: [`SimTime`], a shared manual clock
//!   the simulated sleep controller advances, so tests control time
//!   exactly.

#[cfg(target_os = "espidf")]
use crate::app::ports::Clock;

// ── ESP-IDF backend ───────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct SystemClock;

#[cfg(target_os = "espidf")]
impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "espidf")]
impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        // SAFETY: gettimeofday writes only into `tv`; a null tz is allowed.
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return 0;
        }
        tv.tv_sec as i64
    }

    fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }
}

// ── Simulation backend ───────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub use sim::SimTime;

#[cfg(not(target_os = "espidf"))]
mod sim {
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::app::ports::Clock;

    /// 2024-03-10 15:30:00 UTC.
    pub const SIM_EPOCH: i64 = 1_710_084_600;

    #[derive(Debug, Default)]
    struct Inner {
        unix_ms: Cell<i64>,
        uptime_ms: Cell<u64>,
    }

    /// Manually driven clock.  Clones share the same time.
    #[derive(Debug, Clone, Default)]
    pub struct SimTime {
        inner: Rc<Inner>,
    }

    impl SimTime {
        pub fn new() -> Self {
            Self::starting_at(SIM_EPOCH)
        }

        pub fn starting_at(unix: i64) -> Self {
            let t = Self::default();
            t.set_unix(unix);
            t
        }

        pub fn now_unix(&self) -> i64 {
            self.inner.unix_ms.get().div_euclid(1000)
        }

        pub fn uptime_ms(&self) -> u64 {
            self.inner.uptime_ms.get()
        }

        /// Move both clocks forward.
        pub fn advance_ms(&self, ms: u64) {
            self.inner.unix_ms.set(self.inner.unix_ms.get() + ms as i64);
            self.inner.uptime_ms.set(self.inner.uptime_ms.get() + ms);
        }

        /// Jump the wall clock, leaving uptime alone.
        pub fn set_unix(&self, unix: i64) {
            self.inner.unix_ms.set(unix * 1000);
        }

        /// Uptime restarts from zero, as after a reset.
        pub fn reboot(&self) {
            self.inner.uptime_ms.set(0);
        }
    }

    impl Clock for SimTime {
        fn now_unix(&self) -> i64 {
            SimTime::now_unix(self)
        }

        fn uptime_ms(&self) -> u64 {
            SimTime::uptime_ms(self)
        }
    }

}
