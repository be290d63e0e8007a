//! End-to-end device flows: counting, scheduling, reporting and recovery,
//! driven through the service the way the control loop drives it.

use crate::mock_device::MockDevice;

use occucount::adapters::system::SystemCall;
use occucount::app::events::AppEvent;
use occucount::app::ports::ResetReason;
use occucount::config::timing;
use occucount::escalation::Recovery;
use occucount::fsm::StateId;
use occucount::upload::{ACK_TOPIC, REPORT_TOPIC};

/// 23:30 local at the default UTC-5 offset.
const LATE_EVENING: i64 = 1_710_084_600 + 13 * 3600;

fn booted() -> MockDevice {
    let mut dev = MockDevice::new();
    assert_eq!(dev.boot(), StateId::Idle);
    dev
}

/// Report the current hour via the console and leave the FSM waiting.
fn send_report(dev: &mut MockDevice) {
    assert!(dev.call("SendNow", "1"));
    assert_eq!(dev.tick(), StateId::Reporting);
    assert_eq!(dev.tick(), StateId::ResponseWait);
}

// ── Counting ─────────────────────────────────────────────────

#[test]
fn accepted_edges_count_once_each() {
    let mut dev = booted();
    for _ in 0..3 {
        dev.time.advance_ms(1_000);
        dev.edge();
    }
    let stored = dev.stored();
    assert_eq!((stored.hourly, stored.daily), (3, 3));
    assert!(dev.saw(&AppEvent::CountRecorded { hourly: 3, daily: 3 }));
    assert_eq!(dev.app.variables().hourly, 3);
}

#[test]
fn burst_inside_one_minute_is_reversed() {
    let mut dev = booted();
    assert!(dev.call("Set-MaxMin-Limit", "3"));
    for _ in 0..3 {
        dev.time.advance_ms(1_000);
        dev.edge();
    }
    let stored = dev.stored();
    assert_eq!((stored.hourly, stored.daily), (0, 0));
    assert_eq!(stored.alert_count, 1);
    assert!(dev.saw(&AppEvent::BurstReversed { removed: 3, alerts: 1 }));
}

// ── Scheduling ───────────────────────────────────────────────

#[test]
fn closed_hours_send_the_device_to_sleep() {
    let mut dev = MockDevice::new();
    let mut regs = dev.stored();
    regs.config.open_hour = 6;
    regs.config.close_hour = 22;
    regs.store_config(&mut dev.store).unwrap();
    dev.time.set_unix(LATE_EVENING);

    assert_eq!(dev.boot(), StateId::Idle);
    assert!(!dev.board.is_sensing());
    assert_eq!(dev.tick(), StateId::Sleeping);
}

#[test]
fn pending_count_is_reported_before_sleeping() {
    let mut dev = MockDevice::new();
    dev.time.set_unix(LATE_EVENING);
    let mut regs = dev.stored();
    regs.config.open_hour = 6;
    regs.config.close_hour = 22;
    regs.hourly = 5;
    regs.daily = 5;
    regs.last_event = (LATE_EVENING - 60) as u32;
    regs.store_config(&mut dev.store).unwrap();
    regs.store_counts(&mut dev.store).unwrap();
    regs.store_last_event(&mut dev.store).unwrap();

    assert_eq!(dev.boot(), StateId::Idle);
    assert_eq!(dev.tick(), StateId::Sleeping);
    assert_eq!(dev.tick(), StateId::Reporting);
    assert_eq!(dev.tick(), StateId::ResponseWait);
    assert!(dev.system.calls().is_empty());

    dev.link.deliver(ACK_TOPIC, "200");
    assert_eq!(dev.tick(), StateId::Idle);
    assert_eq!(dev.tick(), StateId::Sleeping);
    assert_eq!(dev.stored().hourly, 0);

    assert_eq!(dev.tick(), StateId::Initialization);
    assert!(matches!(dev.system.calls(), [SystemCall::DeepSleep(_)]));
    assert!(!dev.link.is_powered());
    assert!(!dev.stored().flags.connection);
}

#[test]
fn solar_profile_lowers_the_battery_floor() {
    let mut dev = MockDevice::new();
    dev.power.set_state_of_charge(25);
    let mut regs = dev.stored();
    regs.update_flags(&mut dev.store, |f| f.solar_power = true).unwrap();
    assert_eq!(dev.boot(), StateId::Idle);
    assert_eq!(dev.tick(), StateId::Idle);

    let mut dev = MockDevice::new();
    dev.power.set_state_of_charge(25);
    assert_eq!(dev.boot(), StateId::Idle);
    assert_eq!(dev.tick(), StateId::LowBattery);
    assert_eq!(dev.tick(), StateId::Initialization);
    assert!(!dev.board.is_sensing());
}

// ── Reporting ────────────────────────────────────────────────

#[test]
fn acknowledged_report_reconciles_hourly_count() {
    let mut dev = booted();
    for _ in 0..2 {
        dev.time.advance_ms(1_000);
        dev.edge();
    }
    send_report(&mut dev);
    let body = dev.link.published_on(REPORT_TOPIC).next().unwrap().to_owned();
    assert!(body.contains("\"hourly\":2"));
    assert!(body.contains("\"battery\":80"));

    // One more arrives while the report is in flight.
    dev.time.advance_ms(1_000);
    dev.edge();

    dev.link.deliver(ACK_TOPIC, "201");
    assert_eq!(dev.tick(), StateId::Idle);
    dev.tick();
    let stored = dev.stored();
    assert_eq!((stored.hourly, stored.daily), (1, 3));
    assert!(dev.saw(&AppEvent::ReportReconciled { count: 2, remaining: 1 }));
    assert!(!dev.app.context().upload.is_outstanding());
}

#[test]
fn duplicate_acknowledgment_is_ignored() {
    let mut dev = booted();
    dev.edge();
    send_report(&mut dev);
    dev.link.deliver(ACK_TOPIC, "200");
    dev.tick();
    dev.tick();
    dev.edge();
    dev.link.deliver(ACK_TOPIC, "200");
    dev.tick();
    assert_eq!(dev.stored().hourly, 1);
}

#[test]
fn rejected_acknowledgment_keeps_waiting() {
    let mut dev = booted();
    dev.edge();
    send_report(&mut dev);
    dev.link.deliver(ACK_TOPIC, "500");
    assert_eq!(dev.tick(), StateId::ResponseWait);
    assert!(dev.app.context().upload.is_outstanding());
    assert_eq!(dev.link.published_on("Ubidots Hook").next(), Some("500"));
}

// ── Recovery ─────────────────────────────────────────────────

#[test]
fn ack_timeout_restarts_then_escalates_to_modem_reset() {
    let mut dev = MockDevice::new();
    let mut regs = dev.stored();
    regs.reset_count = timing::ESCALATION_CEILING - 1;
    regs.last_event = dev.time.now_unix() as u32;
    regs.store_reset_count(&mut dev.store).unwrap();
    regs.store_last_event(&mut dev.store).unwrap();
    assert_eq!(dev.boot(), StateId::Idle);

    send_report(&mut dev);
    dev.time.advance_ms(timing::ACK_WAIT_MS + 1);
    assert_eq!(dev.tick(), StateId::Error);
    assert!(dev.saw(&AppEvent::AckTimedOut));

    // Below the ceiling: plain restart.
    dev.time.advance_ms(timing::ERROR_COOLDOWN_MS);
    assert_eq!(dev.tick(), StateId::Initialization);
    assert!(dev.saw(&AppEvent::Recovering(Recovery::Restart)));
    assert_eq!(dev.system.restarts(), 1);

    // The restart pushes the ledger to the ceiling; boot holds in Error.
    assert_eq!(dev.tick(), StateId::Error);
    assert_eq!(dev.stored().reset_count, timing::ESCALATION_CEILING);

    dev.time.advance_ms(timing::ERROR_COOLDOWN_MS);
    assert_eq!(dev.tick(), StateId::Initialization);
    assert!(dev.saw(&AppEvent::Recovering(Recovery::ModemReset)));
    assert_eq!(dev.link.modem_resets(), 1);
    assert_eq!(dev.stored().reset_count, 0);
    assert_eq!(
        dev.system.calls().last(),
        Some(&SystemCall::DeepSleep(timing::MODEM_RESET_SLEEP_SECS))
    );

    // Waking from that sleep is a planned reset.
    assert_eq!(dev.tick(), StateId::Idle);
    assert_eq!(dev.stored().reset_count, 0);
}

#[test]
fn unplanned_reset_is_folded_into_the_ledger() {
    let mut dev = MockDevice::new();
    let mut regs = dev.stored();
    regs.last_event = dev.time.now_unix() as u32;
    regs.store_last_event(&mut dev.store).unwrap();
    dev.system.set_reset_reason(ResetReason::Watchdog);
    dev.boot();
    assert!(dev.saw(&AppEvent::Booted { resets: 1, rolled_over: false }));
}

#[test]
fn missing_store_holds_in_error() {
    let mut dev = MockDevice::new();
    dev.store.set_absent(true);
    assert_eq!(dev.boot(), StateId::Error);
}

#[test]
fn watchdog_request_is_served_from_idle() {
    let mut dev = booted();
    dev.board.request_watchdog_pet();
    dev.tick();
    assert_eq!(dev.board.watchdog_pets(), 1);
}
