//! Operator console.
//!
//! Named functions invoked remotely with a single string argument.  Every
//! argument is parsed and range-checked before anything changes, so a
//! rejected call leaves both the register store and the in-memory mirror
//! untouched.  The service reports the outcome back as a boolean.
//!
//! ```text
//!  "Set-Debounce", "1.5" ──▶ ConsoleCommand::parse ──▶ apply(ctx, ports)
//!                                 │ Err                     │
//!                                 ▼                         ▼
//!                               false              persist + notice
//! ```

use core::fmt::Write as _;

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::app::ports::Ports;
use crate::config::{self, timing};
use crate::error::{ConfigError, Error};
use crate::fsm::context::FsmContext;
use crate::power::ChargeProfile;
use crate::registers::Registers;
use crate::telemetry::SignalString;

/// Release identifier exposed on the console.
pub const RELEASE: &str = "1.01";

/// Short formatted console strings.
pub type ConsoleString = heapless::String<32>;

/// One parsed console call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsoleCommand {
    /// Rewrite the register store with defaults.
    ResetFram,
    /// Zero hourly, daily and reset counts and drop any outstanding report.
    ResetCounts,
    /// Cut board power.
    HardReset,
    /// Report at the next Idle evaluation.
    SendNow,
    LowPowerMode(bool),
    SolarMode(bool),
    VerboseMode(bool),
    SetTimeZone(i8),
    SetOpenHour(u8),
    SetCloseHour(u8),
    /// Debounce in deciseconds.
    SetDebounce(u8),
    SetMaxPerMinute(u8),
}

impl ConsoleCommand {
    /// Parse a function name and its argument.
    pub fn parse(name: &str, arg: &str) -> Result<Self, ConfigError> {
        match name {
            "resetFRAM" => confirm(arg).map(|()| Self::ResetFram),
            "resetCounts" => confirm(arg).map(|()| Self::ResetCounts),
            "HardReset" => confirm(arg).map(|()| Self::HardReset),
            "SendNow" => confirm(arg).map(|()| Self::SendNow),
            "LowPowerMode" => switch(arg).map(Self::LowPowerMode),
            "Solar-Mode" => switch(arg).map(Self::SolarMode),
            "Verbose-Mode" => switch(arg).map(Self::VerboseMode),
            "Set-Timezone" => config::validate_time_zone(integer(arg)?).map(Self::SetTimeZone),
            "Set-OpenTime" => config::validate_open_hour(integer(arg)?).map(Self::SetOpenHour),
            "Set-Close" => config::validate_close_hour(integer(arg)?).map(Self::SetCloseHour),
            "Set-Debounce" => {
                let secs: f32 = arg
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::Malformed("expected seconds"))?;
                config::validate_debounce_secs(secs).map(Self::SetDebounce)
            }
            "Set-MaxMin-Limit" => {
                config::validate_max_per_minute(integer(arg)?).map(Self::SetMaxPerMinute)
            }
            _ => Err(ConfigError::UnknownFunction),
        }
    }

    /// Carry out the command against the device context.
    pub fn apply(self, ctx: &mut FsmContext, ports: &mut Ports<'_>) -> Result<(), Error> {
        match self {
            Self::ResetFram => {
                Registers::reset_store(ports.store)?;
                ctx.regs = Registers::load(ports.store)?;
                ctx.upload.abandon();
            }
            Self::ResetCounts => {
                ctx.regs.hourly = 0;
                ctx.regs.daily = 0;
                ctx.regs.reset_count = 0;
                ctx.regs.store_counts(ports.store)?;
                ctx.regs.store_reset_count(ports.store)?;
                ctx.upload.abandon();
                info!("Counts reset from console");
            }
            Self::HardReset => {
                warn!("Hard reset from console");
                ports.board.cut_power();
            }
            Self::SendNow => ctx.report_requested = true,
            Self::LowPowerMode(true) => {
                if ctx.regs.flags.connection {
                    ports.link.disconnect();
                    ctx.regs.update_flags(ports.store, |f| f.connection = false)?;
                    ports.link.power_off();
                    ports.system.delay_ms(timing::MODEM_POWER_DOWN_SETTLE_MS);
                }
                ctx.regs.update_flags(ports.store, |f| f.low_power = true)?;
                ctx.notifier.publish(ports.link, "Mode", "Low Power");
            }
            Self::LowPowerMode(false) => {
                if !ctx.regs.flags.connection {
                    ports.link.power_on();
                    ports.link.connect(timing::CONNECT_TIMEOUT_MS)?;
                    ctx.regs.update_flags(ports.store, |f| f.connection = true)?;
                }
                ctx.regs.update_flags(ports.store, |f| f.low_power = false)?;
                ctx.notifier.publish(ports.link, "Mode", "Normal Operations");
            }
            Self::SolarMode(on) => {
                ctx.regs.update_flags(ports.store, |f| f.solar_power = on)?;
                let profile = ChargeProfile::for_mode(on);
                ports.power.apply_charge_profile(profile);
                ctx.low_battery_limit = profile.low_battery_limit;
                let msg = if on { "Set Solar Powered Mode" } else { "Cleared Solar Powered Mode" };
                ctx.notifier.publish(ports.link, "Mode", msg);
            }
            Self::VerboseMode(on) => {
                ctx.regs.update_flags(ports.store, |f| f.verbose = on)?;
                let msg = if on { "Set Verbose Mode" } else { "Cleared Verbose Mode" };
                ctx.notifier.publish(ports.link, "Mode", msg);
            }
            Self::SetTimeZone(tz) => {
                ctx.regs.config.time_zone = tz;
                store_config(ctx, ports, "Time", format_args!("Time zone offset {}", tz))?;
            }
            Self::SetOpenHour(h) => {
                ctx.regs.config.open_hour = h;
                store_config(ctx, ports, "Time", format_args!("Open time set to {}", h))?;
            }
            Self::SetCloseHour(h) => {
                ctx.regs.config.close_hour = h;
                store_config(ctx, ports, "Time", format_args!("Closing time set to {}", h))?;
            }
            Self::SetDebounce(ds) => {
                ctx.regs.config.debounce_ds = ds;
                store_config(ctx, ports, "Debounce", format_args!("{}", debounce_string(ds)))?;
            }
            Self::SetMaxPerMinute(m) => {
                ctx.regs.config.max_per_minute = m;
                store_config(ctx, ports, "MaxMin", format_args!("MaxMin limit set to {}", m))?;
            }
        }
        Ok(())
    }
}

fn confirm(arg: &str) -> Result<(), ConfigError> {
    if arg.trim() == "1" {
        Ok(())
    } else {
        Err(ConfigError::Malformed("expected \"1\""))
    }
}

fn switch(arg: &str) -> Result<bool, ConfigError> {
    match arg.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        _ => Err(ConfigError::Malformed("expected \"1\" or \"0\"")),
    }
}

fn integer(arg: &str) -> Result<i32, ConfigError> {
    arg.trim()
        .parse()
        .map_err(|_| ConfigError::Malformed("expected an integer"))
}

/// Persist the configuration block and publish the echo.  On a storage
/// failure the mirror is reloaded so it never runs ahead of the store.
fn store_config(
    ctx: &mut FsmContext,
    ports: &mut Ports<'_>,
    topic: &str,
    echo: core::fmt::Arguments<'_>,
) -> Result<(), Error> {
    if let Err(e) = ctx.regs.store_config(ports.store) {
        if let Ok(regs) = Registers::load(ports.store) {
            ctx.regs = regs;
        }
        return Err(e.into());
    }
    let mut msg = ConsoleString::new();
    let _ = msg.write_fmt(echo);
    ctx.notifier.publish(ports.link, topic, &msg);
    Ok(())
}

/// `"0.5 sec"` for 5 deciseconds.
pub fn debounce_string(ds: u8) -> ConsoleString {
    let mut s = ConsoleString::new();
    let _ = write!(s, "{}.{} sec", ds / 10, ds % 10);
    s
}

// ───────────────────────────────────────────────────────────────
// Read-only variables
// ───────────────────────────────────────────────────────────────

/// Snapshot of the values the console exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleVariables {
    pub hourly: u16,
    pub daily: u16,
    pub signal: SignalString,
    pub reset_count: u8,
    pub temperature_f: i16,
    pub release: &'static str,
    pub state_of_charge: u8,
    pub low_power: bool,
    pub open_time: u8,
    pub close_time: u8,
    pub debounce: ConsoleString,
    pub max_min_limit: u8,
    pub alerts: u8,
}

impl ConsoleVariables {
    pub fn snapshot(ctx: &FsmContext) -> Self {
        let regs = &ctx.regs;
        Self {
            hourly: regs.hourly,
            daily: regs.daily,
            signal: ctx.telemetry.signal.clone(),
            reset_count: regs.reset_count,
            temperature_f: ctx.telemetry.temperature_f,
            release: RELEASE,
            state_of_charge: ctx.telemetry.state_of_charge,
            low_power: regs.flags.low_power,
            open_time: regs.config.open_hour,
            close_time: regs.config.close_hour,
            debounce: debounce_string(regs.config.debounce_ds),
            max_min_limit: regs.config.max_per_minute,
            alerts: regs.alert_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{RegisterStore, TransportPort};
    use crate::registers::layout;
    use crate::testkit::SimRig;

    fn loaded() -> (SimRig, FsmContext) {
        let mut rig = SimRig::new();
        let mut ctx = FsmContext::new();
        ctx.regs = rig.formatted_registers();
        (rig, ctx)
    }

    fn run(rig: &mut SimRig, ctx: &mut FsmContext, name: &str, arg: &str) -> bool {
        ConsoleCommand::parse(name, arg)
            .map_err(Error::from)
            .and_then(|cmd| cmd.apply(ctx, &mut rig.ports()))
            .is_ok()
    }

    #[test]
    fn parse_accepts_known_functions() {
        assert_eq!(ConsoleCommand::parse("SendNow", "1"), Ok(ConsoleCommand::SendNow));
        assert_eq!(
            ConsoleCommand::parse("LowPowerMode", "0"),
            Ok(ConsoleCommand::LowPowerMode(false))
        );
        assert_eq!(
            ConsoleCommand::parse("Set-Timezone", " -7 "),
            Ok(ConsoleCommand::SetTimeZone(-7))
        );
        assert_eq!(
            ConsoleCommand::parse("Set-Debounce", "1.5"),
            Ok(ConsoleCommand::SetDebounce(15))
        );
    }

    #[test]
    fn parse_rejects_bad_arguments() {
        assert!(matches!(
            ConsoleCommand::parse("Set-OpenTime", "6am"),
            Err(ConfigError::Malformed(_))
        ));
        assert!(matches!(
            ConsoleCommand::parse("Set-OpenTime", "24"),
            Err(ConfigError::ValidationFailed(_))
        ));
        assert!(ConsoleCommand::parse("resetCounts", "yes").is_err());
        assert!(ConsoleCommand::parse("Verbose-Mode", "2").is_err());
        assert!(ConsoleCommand::parse("Set-MaxMin-Limit", "31").is_err());
        assert_eq!(
            ConsoleCommand::parse("Reboot", "1"),
            Err(ConfigError::UnknownFunction)
        );
    }

    #[test]
    fn negative_debounce_changes_nothing() {
        let (mut rig, mut ctx) = loaded();
        assert!(!run(&mut rig, &mut ctx, "Set-Debounce", "-1"));
        assert_eq!(ctx.regs.config.debounce_ds, 5);
        assert_eq!(rig.store.read_u8(layout::DEBOUNCE).unwrap(), 5);
    }

    #[test]
    fn setters_persist() {
        let (mut rig, mut ctx) = loaded();
        assert!(run(&mut rig, &mut ctx, "Set-OpenTime", "6"));
        assert!(run(&mut rig, &mut ctx, "Set-Close", "22"));
        assert!(run(&mut rig, &mut ctx, "Set-Debounce", "2.0"));
        assert!(run(&mut rig, &mut ctx, "Set-MaxMin-Limit", "12"));
        let stored = Registers::load(&mut rig.store).unwrap();
        assert_eq!(stored.config, ctx.regs.config);
        assert_eq!(stored.config.open_hour, 6);
        assert_eq!(stored.config.close_hour, 22);
        assert_eq!(stored.config.debounce_ds, 20);
        assert_eq!(stored.config.max_per_minute, 12);
    }

    #[test]
    fn setter_echo_is_published_when_connected() {
        let (mut rig, mut ctx) = loaded();
        rig.link.power_on();
        rig.link.connect(1_000).unwrap();
        assert!(run(&mut rig, &mut ctx, "Set-Debounce", "1.2"));
        assert_eq!(rig.link.published_on("Debounce").next(), Some("1.2 sec"));
    }

    #[test]
    fn reset_counts_drops_outstanding_report() {
        let (mut rig, mut ctx) = loaded();
        rig.link.power_on();
        rig.link.connect(1_000).unwrap();
        ctx.regs.hourly = 3;
        ctx.regs.daily = 9;
        ctx.regs.reset_count = 2;
        let report = crate::upload::Report {
            hourly: 3,
            ..Default::default()
        };
        ctx.upload.send(&report, &mut rig.link, 0).unwrap();
        assert!(run(&mut rig, &mut ctx, "resetCounts", "1"));
        assert!(!ctx.upload.is_outstanding());
        let stored = Registers::load(&mut rig.store).unwrap();
        assert_eq!((stored.hourly, stored.daily, stored.reset_count), (0, 0, 0));
    }

    #[test]
    fn reset_fram_restores_defaults() {
        let (mut rig, mut ctx) = loaded();
        assert!(run(&mut rig, &mut ctx, "Set-OpenTime", "7"));
        assert!(run(&mut rig, &mut ctx, "resetFRAM", "1"));
        assert_eq!(ctx.regs, Registers::load(&mut rig.store).unwrap());
        assert_eq!(ctx.regs.config.open_hour, 0);
    }

    #[test]
    fn entering_low_power_drops_the_radio() {
        let (mut rig, mut ctx) = loaded();
        ctx.regs
            .update_flags(&mut rig.store, |f| f.connection = true)
            .unwrap();
        rig.link.power_on();
        rig.link.connect(1_000).unwrap();
        assert!(run(&mut rig, &mut ctx, "LowPowerMode", "1"));
        assert!(ctx.regs.flags.low_power);
        assert!(!ctx.regs.flags.connection);
        assert!(!rig.link.is_powered());
    }

    #[test]
    fn leaving_low_power_connects() {
        let (mut rig, mut ctx) = loaded();
        ctx.regs
            .update_flags(&mut rig.store, |f| f.low_power = true)
            .unwrap();
        assert!(run(&mut rig, &mut ctx, "LowPowerMode", "0"));
        assert!(!ctx.regs.flags.low_power);
        assert!(ctx.regs.flags.connection);
        assert!(rig.link.is_connected());
        assert_eq!(rig.link.published_on("Mode").next(), Some("Normal Operations"));
    }

    #[test]
    fn solar_mode_reapplies_charge_profile() {
        let (mut rig, mut ctx) = loaded();
        assert!(run(&mut rig, &mut ctx, "Solar-Mode", "1"));
        assert_eq!(ctx.low_battery_limit, 20);
        assert_eq!(rig.power.applied().last(), Some(&crate::power::SOLAR));
        assert!(ctx.regs.flags.solar_power);
        assert!(!ctx.regs.flags.verbose);
    }

    #[test]
    fn send_now_and_hard_reset() {
        let (mut rig, mut ctx) = loaded();
        assert!(run(&mut rig, &mut ctx, "SendNow", "1"));
        assert!(ctx.report_requested);
        assert!(run(&mut rig, &mut ctx, "HardReset", "1"));
        assert_eq!(rig.board.power_cuts(), 1);
    }

    #[test]
    fn variables_reflect_context() {
        let (_, mut ctx) = loaded();
        ctx.regs.hourly = 4;
        ctx.regs.alert_count = 1;
        let v = ConsoleVariables::snapshot(&ctx);
        assert_eq!(v.hourly, 4);
        assert_eq!(v.alerts, 1);
        assert_eq!(v.release, "1.01");
        assert_eq!(v.debounce.as_str(), "0.5 sec");
        assert_eq!(debounce_string(50).as_str(), "5.0 sec");
    }
}
