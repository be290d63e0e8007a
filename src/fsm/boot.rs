//! Boot sequence, run by the `Initialization` state after every reset.
//!
//! Everything the device knows on entry comes from the register store;
//! this module rebuilds the in-memory context from it, folds the reset
//! cause into the escalation ledger, applies the day rollover and brings
//! sensing and the radio up for the current schedule.

use log::{error, info, warn};

use super::StateId;
use super::context::FsmContext;
use crate::app::events::AppEvent;
use crate::app::ports::Ports;
use crate::config::timing;
use crate::error::StorageError;
use crate::power::ChargeProfile;
use crate::registers::Registers;
use crate::schedule::{LocalTime, OpenHours, is_new_day};

/// Run the boot sequence and pick the first operating state.
pub fn run(ctx: &mut FsmContext, ports: &mut Ports<'_>) -> StateId {
    match load(ctx, ports) {
        Ok(next) => next,
        Err(e) => {
            error!("Boot failed: {}", e);
            StateId::Error
        }
    }
}

fn load(ctx: &mut FsmContext, ports: &mut Ports<'_>) -> Result<StateId, StorageError> {
    ports.store.begin()?;
    Registers::ensure_schema(ports.store)?;
    ctx.regs = Registers::load(ports.store)?;

    let reason = ports.system.reset_reason();
    ctx.escalation.note_boot(&mut ctx.regs, reason, ports)?;

    let profile = ChargeProfile::for_mode(ctx.regs.flags.solar_power);
    ports.power.apply_charge_profile(profile);
    ctx.low_battery_limit = profile.low_battery_limit;

    let now = ports.clock.now_unix();
    let tz = ctx.regs.config.time_zone;
    ctx.current_hour_period = LocalTime::at(now, tz).hour;

    if ports.board.user_switch_pressed() {
        rescue(ctx, ports, now)?;
    }

    let rolled_over = is_new_day(i64::from(ctx.regs.last_event), now, tz);
    if rolled_over {
        info!("New day, resetting counters");
        let regs = &mut ctx.regs;
        regs.hourly = 0;
        regs.daily = 0;
        regs.reset_count = 0;
        regs.alert_count = 0;
        regs.last_event = now.max(0) as u32;
        regs.store_counts(ports.store)?;
        regs.store_reset_count(ports.store)?;
        regs.store_alert_count(ports.store)?;
        regs.store_last_event(ports.store)?;
    }

    ctx.emit(AppEvent::Booted {
        resets: ctx.regs.reset_count,
        rolled_over,
    });

    if ctx.escalation.should_halt_at_boot(&ctx.regs) {
        warn!(
            "Reset count {} at ceiling {}, holding in Error",
            ctx.regs.reset_count,
            ctx.escalation.ceiling()
        );
        return Ok(StateId::Error);
    }

    let open = OpenHours::from_config(&ctx.regs.config).is_open(ctx.current_hour_period);
    if open {
        ports.board.set_sensing(true);
        if ctx.regs.flags.connection {
            ports.link.power_on();
            if let Err(e) = ports.link.connect(timing::CONNECT_TIMEOUT_MS) {
                warn!("Boot connect failed: {}", e);
            }
        }
    }
    ctx.telemetry.refresh(ports);
    ctx.stay_awake(timing::STAY_AWAKE_LONG_MS, ports.clock.uptime_ms());

    info!(
        "Boot complete: hourly={} daily={} resets={} open={}",
        ctx.regs.hourly, ctx.regs.daily, ctx.regs.reset_count, open
    );
    Ok(StateId::Idle)
}

/// User switch held at boot: leave low-power mode, keep the radio up, and
/// if the schedule would keep the device asleep right now, open around the
/// clock.
fn rescue(ctx: &mut FsmContext, ports: &mut Ports<'_>, now: i64) -> Result<(), StorageError> {
    warn!("Rescue switch held at boot");
    ctx.regs.update_flags(ports.store, |f| {
        f.low_power = false;
        f.connection = true;
    })?;
    let hours = OpenHours::from_config(&ctx.regs.config);
    if !hours.is_open(LocalTime::at(now, ctx.regs.config.time_zone).hour) {
        ctx.regs.config.open_hour = 0;
        ctx.regs.config.close_hour = 0;
        ctx.regs.store_config(ports.store)?;
        info!("Open hours reset to 24 h");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{RegisterStore, ResetReason, TransportPort};
    use crate::registers::layout;
    use crate::testkit::SimRig;

    fn boot(rig: &mut SimRig) -> (StateId, FsmContext) {
        let mut ctx = FsmContext::new();
        let next = run(&mut ctx, &mut rig.ports());
        (next, ctx)
    }

    #[test]
    fn missing_store_goes_to_error() {
        let mut rig = SimRig::new();
        rig.store.set_absent(true);
        assert_eq!(boot(&mut rig).0, StateId::Error);
    }

    #[test]
    fn stuck_schema_goes_to_error() {
        let mut rig = SimRig::new();
        rig.store.set_write_protect(true);
        assert_eq!(boot(&mut rig).0, StateId::Error);
    }

    #[test]
    fn blank_store_boots_into_idle_with_defaults() {
        let mut rig = SimRig::new();
        let (next, ctx) = boot(&mut rig);
        assert_eq!(next, StateId::Idle);
        assert_eq!(ctx.low_battery_limit, 30);
        assert!(rig.board.is_sensing());
        assert_eq!(rig.power.applied().len(), 1);
        assert_eq!(ctx.telemetry.state_of_charge, 80);
    }

    #[test]
    fn solar_flag_selects_solar_profile() {
        let mut rig = SimRig::new();
        let mut regs = rig.formatted_registers();
        regs.update_flags(&mut rig.store, |f| f.solar_power = true).unwrap();
        let (_, ctx) = boot(&mut rig);
        assert_eq!(ctx.low_battery_limit, 20);
    }

    #[test]
    fn unplanned_reset_is_counted() {
        let mut rig = SimRig::new();
        rig.formatted_registers();
        // Same day, so the rollover leaves the ledger alone.
        rig.store
            .write_u32(layout::LAST_EVENT, rig.time.now_unix() as u32)
            .unwrap();
        rig.system.set_reset_reason(ResetReason::Watchdog);
        let (next, ctx) = boot(&mut rig);
        assert_eq!(next, StateId::Idle);
        assert_eq!(ctx.regs.reset_count, 1);
    }

    #[test]
    fn ceiling_holds_boot_in_error() {
        let mut rig = SimRig::new();
        rig.formatted_registers();
        rig.store
            .write_u32(layout::LAST_EVENT, rig.time.now_unix() as u32)
            .unwrap();
        rig.store
            .write_u8(layout::RESET_COUNT, timing::ESCALATION_CEILING - 1)
            .unwrap();
        rig.system.set_reset_reason(ResetReason::Software);
        assert_eq!(boot(&mut rig).0, StateId::Error);
    }

    #[test]
    fn day_rollover_zeroes_counters_and_reanchors() {
        let mut rig = SimRig::new();
        let mut regs = rig.formatted_registers();
        regs.hourly = 3;
        regs.daily = 40;
        regs.reset_count = 2;
        regs.alert_count = 1;
        regs.last_event = (rig.time.now_unix() - 86_400) as u32;
        regs.store_counts(&mut rig.store).unwrap();
        regs.store_reset_count(&mut rig.store).unwrap();
        regs.store_alert_count(&mut rig.store).unwrap();
        regs.store_last_event(&mut rig.store).unwrap();

        let (_, ctx) = boot(&mut rig);
        let stored = Registers::load(&mut rig.store).unwrap();
        for r in [&ctx.regs, &stored] {
            assert_eq!((r.hourly, r.daily, r.reset_count, r.alert_count), (0, 0, 0, 0));
            assert_eq!(i64::from(r.last_event), rig.time.now_unix());
        }
    }

    #[test]
    fn same_day_keeps_counters() {
        let mut rig = SimRig::new();
        let mut regs = rig.formatted_registers();
        regs.daily = 40;
        regs.last_event = (rig.time.now_unix() - 600) as u32;
        regs.store_counts(&mut rig.store).unwrap();
        regs.store_last_event(&mut rig.store).unwrap();
        let (_, ctx) = boot(&mut rig);
        assert_eq!(ctx.regs.daily, 40);
    }

    #[test]
    fn rescue_switch_restores_connection_and_hours() {
        let mut rig = SimRig::new();
        let mut regs = rig.formatted_registers();
        // 10:30 local; closed 12..20
        regs.config.open_hour = 12;
        regs.config.close_hour = 20;
        regs.store_config(&mut rig.store).unwrap();
        regs.update_flags(&mut rig.store, |f| f.low_power = true).unwrap();
        rig.board.press_switch(true);

        let (next, ctx) = boot(&mut rig);
        assert_eq!(next, StateId::Idle);
        assert!(!ctx.regs.flags.low_power);
        assert!(ctx.regs.flags.connection);
        assert_eq!((ctx.regs.config.open_hour, ctx.regs.config.close_hour), (0, 0));
        assert_eq!(rig.store.read_u8(layout::OPEN_HOUR).unwrap(), 0);
        assert!(rig.link.is_connected());
    }

    #[test]
    fn closed_at_boot_leaves_sensing_off() {
        let mut rig = SimRig::new();
        let mut regs = rig.formatted_registers();
        regs.config.open_hour = 12;
        regs.config.close_hour = 20;
        regs.store_config(&mut rig.store).unwrap();
        let (next, _) = boot(&mut rig);
        assert_eq!(next, StateId::Idle);
        assert!(!rig.board.is_sensing());
    }
}
