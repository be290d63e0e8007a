//! Operator console reached through the cloud's function topics.

use crate::mock_device::MockDevice;

use occucount::adapters::system::SystemCall;
use occucount::app::events::AppEvent;
use occucount::app::ports::TransportPort;
use occucount::config::timing;
use occucount::fsm::StateId;
use occucount::upload::ACK_TOPIC;

fn online() -> MockDevice {
    let mut dev = MockDevice::new();
    assert_eq!(dev.boot(), StateId::Idle);
    dev.link.power_on();
    dev.link.connect(1_000).unwrap();
    dev
}

fn result_of(dev: &MockDevice, name: &str) -> Option<String> {
    let topic = format!("result/{name}");
    dev.link.published_on(&topic).last().map(str::to_owned)
}

#[test]
fn negative_debounce_is_rejected_without_side_effects() {
    let mut dev = online();
    dev.link.deliver("function/Set-Debounce", "-1");
    dev.tick();
    assert_eq!(result_of(&dev, "Set-Debounce").as_deref(), Some("0"));
    assert_eq!(dev.stored().config.debounce_ds, 5);
    assert_eq!(dev.app.context().regs.config.debounce_ds, 5);
    assert_eq!(dev.app.variables().debounce.as_str(), "0.5 sec");
}

#[test]
fn valid_debounce_is_stored_and_echoed() {
    let mut dev = online();
    dev.link.deliver("function/Set-Debounce", "2.5");
    dev.tick();
    assert_eq!(result_of(&dev, "Set-Debounce").as_deref(), Some("1"));
    assert_eq!(dev.stored().config.debounce_ds, 25);
    assert_eq!(dev.link.published_on("Debounce").last(), Some("2.5 sec"));
}

#[test]
fn time_zone_change_moves_the_schedule() {
    let mut dev = online();
    assert!(dev.call("Set-Timezone", "3"));
    assert_eq!(dev.stored().config.time_zone, 3);
    assert_eq!(dev.link.published_on("Time").last(), Some("Time zone offset 3"));
    // The local hour moved, so a report is due.
    assert_eq!(dev.tick(), StateId::Reporting);
}

#[test]
fn reset_counts_orphans_the_outstanding_report() {
    let mut dev = online();
    dev.edge();
    dev.edge();
    assert!(dev.call("SendNow", "1"));
    dev.tick();
    assert_eq!(dev.tick(), StateId::ResponseWait);

    assert!(dev.call("resetCounts", "1"));
    let stored = dev.stored();
    assert_eq!((stored.hourly, stored.daily, stored.reset_count), (0, 0, 0));

    // The late acknowledgment has nothing to reconcile against.
    dev.link.deliver(ACK_TOPIC, "200");
    assert_eq!(dev.tick(), StateId::Idle);
    dev.tick();
    assert_eq!(dev.stored().hourly, 0);
}

#[test]
fn low_power_mode_naps_and_switch_restores() {
    let mut dev = online();
    dev.app
        .context_mut()
        .regs
        .update_flags(&mut dev.store, |f| f.connection = true)
        .unwrap();
    assert!(dev.call("LowPowerMode", "1"));
    assert!(!dev.link.is_powered());
    assert!(dev.app.variables().low_power);

    dev.time.advance_ms(timing::STAY_AWAKE_LONG_MS + 1);
    assert_eq!(dev.tick(), StateId::Napping);
    assert_eq!(dev.tick(), StateId::Idle);
    assert!(matches!(dev.system.calls(), [SystemCall::Nap(_)]));

    dev.board.press_switch(true);
    dev.tick();
    assert!(dev.saw(&AppEvent::ManualOverride));
    assert!(!dev.stored().flags.low_power);
    assert!(dev.link.is_connected());
}

#[test]
fn hard_reset_cuts_power() {
    let mut dev = online();
    dev.link.deliver("function/HardReset", "1");
    dev.tick();
    assert_eq!(dev.board.power_cuts(), 1);
    assert_eq!(result_of(&dev, "HardReset").as_deref(), Some("1"));
}

#[test]
fn verbose_mode_echoes_counts() {
    let mut dev = online();
    assert!(dev.call("Verbose-Mode", "1"));
    assert_eq!(dev.link.published_on("Mode").last(), Some("Set Verbose Mode"));
    dev.time.advance_ms(1_000);
    dev.edge();
    assert_eq!(dev.link.published_on("Count").last(), Some("hourly: 1, daily: 1"));
}

#[test]
fn console_calls_are_reported_as_events() {
    let mut dev = online();
    dev.link.deliver("function/Solar-Mode", "maybe");
    dev.tick();
    assert!(dev.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::ConsoleCall { name, ok: false } if name.as_str() == "Solar-Mode"
    )));
    assert!(!dev.stored().flags.solar_power);
}
