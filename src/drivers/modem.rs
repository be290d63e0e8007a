//! AT command channel to the cellular modem.
//!
//! The modem answers AT commands on its UART while it is in command mode,
//! which is before the data session is dialled.  Two commands matter here:
//! `AT+CSQ` for signal quality and `AT+CFUN=16` for a silent reset.
//!
//! The response parsing is target-independent so it runs under host tests.

/// Signal quality query.
pub const CSQ_COMMAND: &str = "AT+CSQ\r\n";
/// Silent modem reset; the modem reboots without dropping its supply.
pub const SILENT_RESET_COMMAND: &str = "AT+CFUN=16\r\n";
/// Bare attention, used to check the modem answers at all.
pub const ATTENTION_COMMAND: &str = "AT\r\n";

/// `AT+CSQ` answers within a second.
pub const CSQ_TIMEOUT_MS: u32 = 1_000;
/// `AT+CFUN=16` may take up to 30 s to answer.
pub const RESET_TIMEOUT_MS: u32 = 30_000;

/// Final result of an AT exchange, if the response holds one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalResult {
    Ok,
    Error,
}

/// Scan a response for its final result code.
pub fn final_result(response: &str) -> Option<FinalResult> {
    response.lines().map(str::trim).find_map(|line| match line {
        "OK" => Some(FinalResult::Ok),
        "ERROR" => Some(FinalResult::Error),
        l if l.starts_with("+CME ERROR") => Some(FinalResult::Error),
        _ => None,
    })
}

/// Pull the RSSI index out of a `+CSQ: <rssi>,<ber>` line.
pub fn parse_csq(response: &str) -> Option<u8> {
    let line = response
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("+CSQ:"))?;
    let fields = line.trim_start_matches("+CSQ:").trim();
    let rssi = fields.split(',').next()?.trim();
    rssi.parse().ok()
}

/// 3GPP TS 27.007 CSQ index to dBm: 0 is -113 dBm or less, 31 is -51 dBm
/// or more, 2 dBm per step between.  99 ("not detectable") and any other
/// index are unknown.
pub fn csq_to_dbm(csq: u8) -> Option<i16> {
    match csq {
        0..=31 => Some(-113 + 2 * i16::from(csq)),
        _ => None,
    }
}

// ── ESP-IDF UART channel ──────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::AtChannel;

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_hal::delay::{FreeRtos, NON_BLOCK};
    use esp_idf_hal::uart::UartDriver;
    use log::debug;

    use super::{FinalResult, final_result};
    use crate::error::CommsError;

    const POLL_MS: u32 = 20;
    /// Longest response kept; anything beyond is dropped.
    const RESPONSE_CAP: usize = 128;

    pub type Response = heapless::String<RESPONSE_CAP>;

    pub struct AtChannel {
        uart: UartDriver<'static>,
    }

    impl AtChannel {
        pub fn new(uart: UartDriver<'static>) -> Self {
            Self { uart }
        }

        /// Send `command` and collect the reply until a final result code
        /// or `timeout_ms`.  A reply ending in `ERROR` is still returned;
        /// only a dead UART or silence is an error.
        pub fn command(&mut self, command: &str, timeout_ms: u32) -> Result<Response, CommsError> {
            self.uart.clear_rx().map_err(|_| CommsError::ModemUnresponsive)?;
            self.uart
                .write(command.as_bytes())
                .map_err(|_| CommsError::ModemUnresponsive)?;

            let mut response = Response::new();
            let mut buf = [0u8; 32];
            let mut waited = 0;
            while waited < timeout_ms {
                let n = self
                    .uart
                    .read(&mut buf, NON_BLOCK)
                    .map_err(|_| CommsError::ModemUnresponsive)?;
                for &b in &buf[..n] {
                    let _ = response.push(char::from(b));
                }
                if final_result(&response).is_some() {
                    debug!("AT {} -> {:?}", command.trim_end(), response.as_str());
                    return Ok(response);
                }
                FreeRtos::delay_ms(POLL_MS);
                waited += POLL_MS;
            }
            debug!("AT {} timed out", command.trim_end());
            Err(CommsError::ModemUnresponsive)
        }

        /// `true` when `command` completes with `OK`.
        pub fn expect_ok(&mut self, command: &str, timeout_ms: u32) -> bool {
            self.command(command, timeout_ms)
                .is_ok_and(|r| final_result(&r) == Some(FinalResult::Ok))
        }
    }
}
