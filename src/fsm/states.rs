//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers: no closures, no heap.
//! Handlers get the owned device context and this tick's ports, and
//! return the next state (or `None` to stay).
//!
//! ```text
//!  INITIALIZATION ──▶ IDLE ◀──────────────────────────────┐
//!        ▲            │  [switch / edge / ack reconcile]   │
//!        │            ├─[battery low]──▶ LOW_BATTERY ──┐   │
//!        │            ├─[closed]──────▶ SLEEPING ──────┤   │
//!        │            │                   │[count]     │   │
//!        │            ├─[new hour]──▶ REPORTING ◀──────┘   │
//!        │            │                   ▼                │
//!        │            │             RESPONSE_WAIT ─[ack]───┘
//!        │            └─[low power]──▶ NAPPING ─[wake]──▶ IDLE
//!        │                                │[timeout / link down]
//!        └──────[restart / modem reset]── ERROR
//! ```

use core::fmt::Write as _;
use core::mem;

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use super::context::FsmContext;
use super::{StateDescriptor, StateId, boot};
use crate::app::events::AppEvent;
use crate::app::ports::{Ports, WakeSource};
use crate::config::timing;
use crate::counter::CountOutcome;
use crate::error::StorageError;
use crate::schedule::{self, Decision, LocalTime, ScheduleInputs};
use crate::upload::{Report, UploadStatus};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Initialization
        StateDescriptor {
            id: StateId::Initialization,
            name: StateId::Initialization.name(),
            on_enter: Some(initialization_enter),
            on_exit: None,
            on_update: initialization_update,
        },
        // Index 1: Error
        StateDescriptor {
            id: StateId::Error,
            name: StateId::Error.name(),
            on_enter: Some(error_enter),
            on_exit: None,
            on_update: error_update,
        },
        // Index 2: Idle
        StateDescriptor {
            id: StateId::Idle,
            name: StateId::Idle.name(),
            on_enter: None,
            on_exit: None,
            on_update: idle_update,
        },
        // Index 3: Sleeping
        StateDescriptor {
            id: StateId::Sleeping,
            name: StateId::Sleeping.name(),
            on_enter: None,
            on_exit: None,
            on_update: sleeping_update,
        },
        // Index 4: Napping
        StateDescriptor {
            id: StateId::Napping,
            name: StateId::Napping.name(),
            on_enter: None,
            on_exit: None,
            on_update: napping_update,
        },
        // Index 5: LowBattery
        StateDescriptor {
            id: StateId::LowBattery,
            name: StateId::LowBattery.name(),
            on_enter: None,
            on_exit: None,
            on_update: low_battery_update,
        },
        // Index 6: Reporting
        StateDescriptor {
            id: StateId::Reporting,
            name: StateId::Reporting.name(),
            on_enter: None,
            on_exit: None,
            on_update: reporting_update,
        },
        // Index 7: ResponseWait
        StateDescriptor {
            id: StateId::ResponseWait,
            name: StateId::ResponseWait.name(),
            on_enter: None,
            on_exit: None,
            on_update: response_wait_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Shared helpers
// ═══════════════════════════════════════════════════════════════════════════

fn service_watchdog(ports: &mut Ports<'_>) {
    if ports.board.take_watchdog_request() {
        ports.board.pet_watchdog();
    }
}

/// Drop the session and power the modem down, clearing the connection flag.
fn radio_down(ctx: &mut FsmContext, ports: &mut Ports<'_>) -> Result<(), StorageError> {
    ports.link.disconnect();
    ctx.regs.update_flags(ports.store, |f| f.connection = false)?;
    ports.link.power_off();
    ports.system.delay_ms(timing::MODEM_POWER_DOWN_SETTLE_MS);
    Ok(())
}

/// Subtract an acknowledged count from the live hourly total and start a
/// new anomaly period.
fn reconcile(ctx: &mut FsmContext, ports: &mut Ports<'_>) -> Result<(), StorageError> {
    let Some(count) = ctx.upload.take_acknowledged() else {
        return Ok(());
    };
    ctx.regs.hourly = ctx.regs.hourly.saturating_sub(count);
    ctx.regs.store_hourly(ports.store)?;
    ctx.counter.reset_period();
    ctx.regs.alert_count = 0;
    ctx.regs.store_alert_count(ports.store)?;
    ctx.emit(AppEvent::ReportReconciled {
        count,
        remaining: ctx.regs.hourly,
    });
    Ok(())
}

fn storage_fault(e: StorageError) -> Option<StateId> {
    error!("Register store failed: {}", e);
    Some(StateId::Error)
}

// ═══════════════════════════════════════════════════════════════════════════
//  INITIALIZATION state
// ═══════════════════════════════════════════════════════════════════════════

fn initialization_enter(ctx: &mut FsmContext, _ports: &mut Ports<'_>) {
    ctx.reset_transient();
}

fn initialization_update(ctx: &mut FsmContext, ports: &mut Ports<'_>) -> Option<StateId> {
    Some(boot::run(ctx, ports))
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE state
// ═══════════════════════════════════════════════════════════════════════════

fn idle_update(ctx: &mut FsmContext, ports: &mut Ports<'_>) -> Option<StateId> {
    service_watchdog(ports);

    // 1. Sensor edge
    let edge = ports.board.take_sensor_event() | mem::take(&mut ctx.wake_edge);
    if edge {
        ports.board.set_activity_led(true);
        let woke = mem::take(&mut ctx.woke_from_nap);
        let outcome = ctx.counter.record(&mut ctx.regs, ports, woke);
        ports.board.set_activity_led(false);
        match outcome {
            Ok(outcome) => announce(ctx, ports, outcome),
            Err(e) => return storage_fault(e),
        }
    }

    // 2. Manual override out of low-power mode
    if ports.board.user_switch_pressed() && ctx.regs.flags.low_power {
        info!("User switch: leaving low-power mode");
        ports.link.power_on();
        if let Err(e) = ports.link.connect(timing::CONNECT_TIMEOUT_MS) {
            warn!("Override connect failed: {}", e);
            return Some(StateId::Error);
        }
        ctx.notice(ports.link, "Mode", "Normal Operations");
        if let Err(e) = ctx.regs.update_flags(ports.store, |f| {
            f.low_power = false;
            f.connection = true;
        }) {
            return storage_fault(e);
        }
        ctx.emit(AppEvent::ManualOverride);
    }

    // 3. Acknowledged report
    if let Err(e) = reconcile(ctx, ports) {
        return storage_fault(e);
    }

    // 4. Schedule
    let inputs = ScheduleInputs {
        now_unix: ports.clock.now_unix(),
        uptime_ms: ports.clock.uptime_ms(),
        state_of_charge: ctx.telemetry.state_of_charge,
        low_battery_limit: ctx.low_battery_limit,
        low_power: ctx.regs.flags.low_power,
        report_hour: ctx.current_hour_period,
        stay_awake_since_ms: ctx.stay_awake_since_ms,
        stay_awake_ms: ctx.stay_awake_ms,
    };
    let decision = schedule::evaluate(&ctx.regs.config, &inputs);
    if decision != Decision::LowBattery && mem::take(&mut ctx.report_requested) {
        return Some(StateId::Reporting);
    }
    match decision {
        Decision::Stay => None,
        Decision::Nap => Some(StateId::Napping),
        Decision::Report => Some(StateId::Reporting),
        Decision::Sleep => Some(StateId::Sleeping),
        Decision::LowBattery => Some(StateId::LowBattery),
    }
}

/// Queue the event and publish the matching notice for one counted edge.
fn announce(ctx: &mut FsmContext, ports: &mut Ports<'_>, outcome: CountOutcome) {
    match outcome {
        CountOutcome::Accepted { hourly, daily } => {
            let mut msg: heapless::String<40> = heapless::String::new();
            let _ = write!(msg, "hourly: {}, daily: {}", hourly, daily);
            ctx.notice(ports.link, "Count", &msg);
            ctx.emit(AppEvent::CountRecorded { hourly, daily });
        }
        CountOutcome::Debounced => {
            ctx.notice(ports.link, "Event", "Debounced");
            ctx.emit(AppEvent::Debounced);
        }
        CountOutcome::BurstReversed { removed } => {
            ctx.notifier.publish(ports.link, "Alert", "Exceeded Maxmin limit");
            ctx.emit(AppEvent::BurstReversed {
                removed,
                alerts: ctx.regs.alert_count,
            });
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  SLEEPING state
// ═══════════════════════════════════════════════════════════════════════════

fn sleeping_update(ctx: &mut FsmContext, ports: &mut Ports<'_>) -> Option<StateId> {
    ports.board.set_sensing(false);
    if ctx.regs.hourly != 0 {
        debug!("{} counts unreported, reporting before sleep", ctx.regs.hourly);
        return Some(StateId::Reporting);
    }
    if ctx.regs.flags.connection {
        if let Err(e) = radio_down(ctx, ports) {
            return storage_fault(e);
        }
    }
    ports.board.enter_low_power();
    service_watchdog(ports);
    let secs = schedule::secs_until_boundary(ports.clock.now_unix());
    info!("Sleeping {} s until the next hour", secs);
    ports.system.deep_sleep(secs);
    Some(StateId::Initialization)
}

// ═══════════════════════════════════════════════════════════════════════════
//  NAPPING state
// ═══════════════════════════════════════════════════════════════════════════

fn napping_update(ctx: &mut FsmContext, ports: &mut Ports<'_>) -> Option<StateId> {
    service_watchdog(ports);
    // Let the object clear the beam before arming the level wake.
    if ports.board.sensor_active() {
        return None;
    }
    if ports.link.is_connected() {
        if let Err(e) = radio_down(ctx, ports) {
            return storage_fault(e);
        }
    }
    ctx.stay_awake_ms = ctx.regs.config.debounce_ms();
    ports.board.pet_watchdog();
    let secs = schedule::secs_until_boundary(ports.clock.now_unix());
    let wake = ports.system.nap(secs);
    if wake == WakeSource::Sensor {
        ctx.woke_from_nap = true;
        ctx.wake_edge = true;
        ctx.stay_awake_since_ms = ports.clock.uptime_ms();
    }
    Some(StateId::Idle)
}

// ═══════════════════════════════════════════════════════════════════════════
//  LOW BATTERY state
// ═══════════════════════════════════════════════════════════════════════════

fn low_battery_update(ctx: &mut FsmContext, ports: &mut Ports<'_>) -> Option<StateId> {
    if ports.link.is_connected() || ctx.regs.flags.connection {
        if let Err(e) = radio_down(ctx, ports) {
            return storage_fault(e);
        }
    }
    ports.board.set_sensing(false);
    ports.board.enter_low_power();
    ports.board.pet_watchdog();
    let secs = schedule::secs_until_boundary(ports.clock.now_unix());
    warn!(
        "Battery at {}% (limit {}%), sleeping {} s",
        ctx.telemetry.state_of_charge, ctx.low_battery_limit, secs
    );
    ports.system.deep_sleep(secs);
    Some(StateId::Initialization)
}

// ═══════════════════════════════════════════════════════════════════════════
//  REPORTING state
// ═══════════════════════════════════════════════════════════════════════════

fn reporting_update(ctx: &mut FsmContext, ports: &mut Ports<'_>) -> Option<StateId> {
    if !ctx.regs.flags.connection {
        ports.link.power_on();
        if let Err(e) = ctx.regs.update_flags(ports.store, |f| f.connection = true) {
            return storage_fault(e);
        }
    }
    if !ports.link.is_connected() {
        if let Err(e) = ports.link.connect(timing::CONNECT_TIMEOUT_MS) {
            warn!("Report connect failed: {}", e);
            return Some(StateId::Error);
        }
    }

    ctx.telemetry.refresh(ports);
    if let Err(e) = reconcile(ctx, ports) {
        return storage_fault(e);
    }

    let report = Report {
        hourly: ctx.regs.hourly,
        daily: ctx.regs.daily,
        battery: ctx.telemetry.state_of_charge,
        temp: ctx.telemetry.temperature_f,
        resets: ctx.regs.reset_count,
        alerts: ctx.regs.alert_count,
        maxmin: ctx.counter.max_per_minute(),
    };
    if let Err(e) = ctx.upload.send(&report, ports.link, ports.clock.uptime_ms()) {
        warn!("Report not sent: {}", e);
        return Some(StateId::Error);
    }
    ctx.emit(AppEvent::ReportSent {
        hourly: report.hourly,
        daily: report.daily,
    });
    ctx.current_hour_period = LocalTime::at(ports.clock.now_unix(), ctx.regs.config.time_zone).hour;
    Some(StateId::ResponseWait)
}

// ═══════════════════════════════════════════════════════════════════════════
//  RESPONSE WAIT state
// ═══════════════════════════════════════════════════════════════════════════

fn response_wait_update(ctx: &mut FsmContext, ports: &mut Ports<'_>) -> Option<StateId> {
    service_watchdog(ports);
    let now = ports.clock.uptime_ms();
    match ctx.upload.status(now) {
        UploadStatus::Pending => None,
        UploadStatus::Acknowledged => {
            ctx.stay_awake(timing::STAY_AWAKE_LONG_MS, now);
            Some(StateId::Idle)
        }
        UploadStatus::TimedOut => {
            ctx.upload.abandon();
            ctx.emit(AppEvent::AckTimedOut);
            Some(StateId::Error)
        }
        // Marker cleared elsewhere (console reset).
        UploadStatus::Idle => Some(StateId::Idle),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  ERROR state
// ═══════════════════════════════════════════════════════════════════════════

fn error_enter(ctx: &mut FsmContext, ports: &mut Ports<'_>) {
    ctx.error_since_ms = ports.clock.uptime_ms();
    warn!("Entering Error state (resets={})", ctx.regs.reset_count);
}

fn error_update(ctx: &mut FsmContext, ports: &mut Ports<'_>) -> Option<StateId> {
    service_watchdog(ports);
    let held = ports.clock.uptime_ms().saturating_sub(ctx.error_since_ms);
    if held < timing::ERROR_COOLDOWN_MS {
        return None;
    }

    if ports.link.is_connected() {
        if let Err(e) = ports.link.publish("State", "ERROR_STATE - Resetting") {
            debug!("Error notice not sent: {}", e);
        }
    }
    ports.system.delay_ms(timing::ERROR_NOTICE_SETTLE_MS);

    ctx.regs.alert_count = ctx.regs.alert_count.saturating_add(1);
    if let Err(e) = ctx.regs.store_alert_count(ports.store) {
        error!("Alert count not persisted: {}", e);
    }

    let recovery = ctx.escalation.decide(ctx.regs.reset_count);
    ctx.emit(AppEvent::Recovering(recovery));
    if let Err(e) = ctx.escalation.execute(recovery, &mut ctx.regs, ports) {
        error!("Recovery bookkeeping failed: {}", e);
    }
    Some(StateId::Initialization)
}
