//! Battery, temperature and signal readings.
//!
//! Refreshed at boot and before every report; they feed the report payload
//! and the console's read-only variables.

use core::fmt::Write as _;

use crate::app::ports::Ports;

/// Formatted signal description, e.g. `"Good: -75"`.
pub type SignalString = heapless::String<24>;

const SIGNAL_LEVELS: [&str; 6] = ["Poor", "Low", "Medium", "Good", "Very Good", "Great"];
const RSSI_FLOOR_DBM: i32 = -131;
const RSSI_CEIL_DBM: i32 = -51;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Telemetry {
    pub state_of_charge: u8,
    pub temperature_f: i16,
    pub signal: SignalString,
}

impl Telemetry {
    /// Sample the charge gauge and thermometer, and the radio if the link
    /// is up.  A link that is down keeps the previous signal string.
    pub fn refresh(&mut self, ports: &mut Ports<'_>) {
        if ports.link.is_connected() {
            if let Some(rssi) = ports.link.rssi_dbm() {
                self.signal = signal_string(rssi);
            }
        }
        self.temperature_f = ports.board.temperature_f();
        self.state_of_charge = ports.power.state_of_charge();
    }
}

/// Quality bucket for `rssi_dbm`, linearly mapped over -131..-51 dBm.
pub fn signal_level(rssi_dbm: i16) -> &'static str {
    let span = RSSI_CEIL_DBM - RSSI_FLOOR_DBM;
    let idx = (i32::from(rssi_dbm) - RSSI_FLOOR_DBM) * 5 / span;
    SIGNAL_LEVELS[idx.clamp(0, 5) as usize]
}

pub fn signal_string(rssi_dbm: i16) -> SignalString {
    let mut s = SignalString::new();
    // Longest output ("Very Good: -32768") fits the capacity.
    let _ = write!(s, "{}: {}", signal_level(rssi_dbm), rssi_dbm);
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::TransportPort;
    use crate::testkit::SimRig;

    #[test]
    fn levels_cover_the_range() {
        assert_eq!(signal_level(-131), "Poor");
        assert_eq!(signal_level(-200), "Poor");
        assert_eq!(signal_level(-91), "Medium");
        assert_eq!(signal_level(-51), "Great");
        assert_eq!(signal_level(-20), "Great");
        assert_eq!(signal_string(-75).as_str(), "Good: -75");
    }

    #[test]
    fn refresh_reads_every_source() {
        let mut rig = SimRig::new();
        rig.power.set_state_of_charge(64);
        rig.board.set_temperature_f(72);
        rig.link.power_on();
        rig.link.connect(1_000).unwrap();
        rig.link.set_rssi(Some(-75));
        let mut t = Telemetry::default();
        t.refresh(&mut rig.ports());
        assert_eq!(t.state_of_charge, 64);
        assert_eq!(t.temperature_f, 72);
        assert_eq!(t.signal.as_str(), "Good: -75");
    }

    #[test]
    fn signal_kept_while_link_down() {
        let mut rig = SimRig::new();
        let mut t = Telemetry {
            signal: signal_string(-100),
            ..Telemetry::default()
        };
        t.refresh(&mut rig.ports());
        assert_eq!(t.signal.as_str(), "Low: -100");
    }
}
