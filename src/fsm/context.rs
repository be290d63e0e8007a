//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single owned device context: the register mirror,
//! the counter engine, the upload protocol and the transient timers all
//! live here and are handed explicitly to each state handler.  Nothing in
//! it survives a reset except what the handlers persist through
//! [`Registers`].

use crate::app::events::AppEvent;
use crate::app::ports::TransportPort;
use crate::config::timing;
use crate::counter::CounterEngine;
use crate::escalation::EscalationPolicy;
use crate::notify::Notifier;
use crate::registers::Registers;
use crate::telemetry::Telemetry;
use crate::upload::UploadProtocol;

/// Events queued between two drains by the service.
pub const OUTBOX_CAP: usize = 16;

pub struct FsmContext {
    // -- Persistent state (mirror) --
    pub regs: Registers,

    // -- Engines --
    pub counter: CounterEngine,
    pub upload: UploadProtocol,
    pub escalation: EscalationPolicy,
    pub notifier: Notifier,
    pub telemetry: Telemetry,

    // -- Transient schedule state --
    /// State-of-charge floor from the active charge profile.
    pub low_battery_limit: u8,
    /// Local hour the current reporting period belongs to.
    pub current_hour_period: u8,
    /// Length of the current stay-awake window.
    pub stay_awake_ms: u64,
    /// Uptime at which the stay-awake window opened.
    pub stay_awake_since_ms: u64,
    /// The last nap ended on the sensor line.
    pub woke_from_nap: bool,
    /// A nap wake that still has to be counted as an edge.
    pub wake_edge: bool,
    /// Operator asked for a report outside the schedule.
    pub report_requested: bool,
    /// Uptime at which `Error` was entered.
    pub error_since_ms: u64,

    /// Events for the service to emit.
    pub outbox: heapless::Vec<AppEvent, OUTBOX_CAP>,
}

impl Default for FsmContext {
    fn default() -> Self {
        Self::new()
    }
}

impl FsmContext {
    pub fn new() -> Self {
        Self {
            regs: Registers::default(),
            counter: CounterEngine::new(),
            upload: UploadProtocol::new(),
            escalation: EscalationPolicy::new(),
            notifier: Notifier::new(),
            telemetry: Telemetry::default(),
            low_battery_limit: 0,
            current_hour_period: 0,
            stay_awake_ms: timing::STAY_AWAKE_LONG_MS,
            stay_awake_since_ms: 0,
            woke_from_nap: false,
            wake_edge: false,
            report_requested: false,
            error_since_ms: 0,
            outbox: heapless::Vec::new(),
        }
    }

    /// Forget everything a reset would wipe.  The register mirror is
    /// reloaded by the boot sequence right after.
    pub fn reset_transient(&mut self) {
        self.counter = CounterEngine::new();
        self.upload = UploadProtocol::new();
        self.stay_awake_ms = timing::STAY_AWAKE_LONG_MS;
        self.stay_awake_since_ms = 0;
        self.woke_from_nap = false;
        self.wake_edge = false;
        self.report_requested = false;
        self.error_since_ms = 0;
    }

    /// Queue an event.  Dropped if the outbox is full.
    pub fn emit(&mut self, event: AppEvent) {
        if self.outbox.push(event).is_err() {
            log::debug!("Event outbox full, dropping event");
        }
    }

    /// Publish a diagnostic notice when verbose mode is on.
    pub fn notice(&mut self, link: &mut dyn TransportPort, topic: &str, payload: &str) {
        if self.regs.flags.verbose {
            self.notifier.publish(link, topic, payload);
        }
    }

    /// Open a stay-awake window of `ms` starting at `now_ms`.
    pub fn stay_awake(&mut self, ms: u64, now_ms: u64) {
        self.stay_awake_ms = ms;
        self.stay_awake_since_ms = now_ms;
    }
}
