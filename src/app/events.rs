//! Outbound application events.
//!
//! FSM handlers queue these in the context outbox; the
//! [`AppService`](super::service::AppService) drains the outbox after each
//! tick and hands every event to the [`EventSink`](super::ports::EventSink)
//! port.  Adapters on the other side decide what to do with them.

use crate::escalation::Recovery;
use crate::fsm::StateId;
use crate::upload::AckOutcome;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The service has started (carries initial state).
    Started(StateId),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// Boot finished loading the registers.
    Booted { resets: u8, rolled_over: bool },

    /// A sensor edge was counted.
    CountRecorded { hourly: u16, daily: u16 },

    /// A sensor edge arrived inside the debounce window.
    Debounced,

    /// A burst was backed out of the counters.
    BurstReversed { removed: u16, alerts: u8 },

    /// An hourly report went out.
    ReportSent { hourly: u16, daily: u16 },

    /// An acknowledged count was subtracted from the hourly total.
    ReportReconciled { count: u16, remaining: u16 },

    /// The acknowledgment topic carried something other than success.
    AckWarning(AckOutcome),

    /// No acknowledgment inside the wait window.
    AckTimedOut,

    /// The user switch forced the device out of low-power mode.
    ManualOverride,

    /// A console function ran.
    ConsoleCall { name: heapless::String<24>, ok: bool },

    /// Error recovery is about to run.
    Recovering(Recovery),
}
