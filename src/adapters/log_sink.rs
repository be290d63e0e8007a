//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => info!("START | initial_state={:?}", state),
            AppEvent::StateChanged { from, to } => info!("STATE | {:?} -> {:?}", from, to),
            AppEvent::Booted { resets, rolled_over } => {
                info!("BOOT  | resets={} day_rollover={}", resets, rolled_over);
            }
            AppEvent::CountRecorded { hourly, daily } => {
                info!("COUNT | hourly={} daily={}", hourly, daily);
            }
            AppEvent::Debounced => info!("COUNT | debounced"),
            AppEvent::BurstReversed { removed, alerts } => {
                warn!("ALERT | burst of {} reversed, alerts={}", removed, alerts);
            }
            AppEvent::ReportSent { hourly, daily } => {
                info!("REPORT| sent hourly={} daily={}", hourly, daily);
            }
            AppEvent::ReportReconciled { count, remaining } => {
                info!("REPORT| reconciled {} (hourly now {})", count, remaining);
            }
            AppEvent::AckWarning(outcome) => warn!("REPORT| acknowledgment {:?}", outcome),
            AppEvent::AckTimedOut => warn!("REPORT| acknowledgment timed out"),
            AppEvent::ManualOverride => info!("MODE  | switch override, normal operations"),
            AppEvent::ConsoleCall { name, ok } => info!("FUNC  | {} -> {}", name, ok),
            AppEvent::Recovering(r) => warn!("RECOV | {:?}", r),
        }
    }
}
