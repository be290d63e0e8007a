//! Upload and acknowledgment protocol.
//!
//! One hourly [`Report`] may be outstanding at a time.  Sending captures
//! the hourly count into the in-flight [`Marker`]; the cloud answers
//! asynchronously on the acknowledgment topic with a bare HTTP-style status
//! code.  A success code turns the marker into `Acknowledged`, and the Idle
//! state later reconciles it by subtracting the captured count from the
//! live hourly total.
//!
//! ```text
//!  Clear ──send──▶ InFlight ──200/201──▶ Acknowledged ──take──▶ Clear
//!                     │
//!                     └──(ACK_WAIT_MS elapses)──▶ TimedOut ──abandon──▶ Clear
//! ```

use log::{debug, info, warn};
use serde::Serialize;

use crate::app::ports::TransportPort;
use crate::config::timing;
use crate::error::CommsError;

/// Event name the hourly report is published under.
pub const REPORT_TOPIC: &str = "Ubidots-Counter-Hook";
/// Topic (relative to the device) the integration answers on.
pub const ACK_TOPIC: &str = "hook-response";

/// The hourly summary.  Field names are the wire contract downstream
/// aggregation depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub hourly: u16,
    pub daily: u16,
    pub battery: u8,
    pub temp: i16,
    pub resets: u8,
    pub alerts: u8,
    pub maxmin: u16,
}

impl Report {
    pub fn to_json(&self) -> Result<String, CommsError> {
        serde_json::to_string(self).map_err(|_| CommsError::Encode)
    }
}

/// The in-flight marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Marker {
    #[default]
    Clear,
    /// `count` was sent at uptime `sent_at_ms`; no answer yet.
    InFlight { count: u16, sent_at_ms: u64 },
    /// The cloud confirmed `count`; waiting to be reconciled.
    Acknowledged { count: u16 },
}

/// Result of feeding one acknowledgment payload to the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Success code; the marker is now `Acknowledged`.
    Success { code: i32 },
    /// Non-success code; the marker is untouched.
    Failure { code: i32 },
    /// Empty payload; the marker is untouched.
    NoData,
    /// Nothing was in flight; ignored.
    Unsolicited,
}

/// What the ResponseWait state sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Idle,
    Pending,
    Acknowledged,
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct UploadProtocol {
    marker: Marker,
    ack_wait_ms: u64,
}

impl Default for UploadProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadProtocol {
    pub const fn new() -> Self {
        Self {
            marker: Marker::Clear,
            ack_wait_ms: timing::ACK_WAIT_MS,
        }
    }

    pub fn marker(&self) -> Marker {
        self.marker
    }

    /// Hourly count captured by the outstanding report, zero when clear.
    pub fn in_flight_count(&self) -> u16 {
        match self.marker {
            Marker::Clear => 0,
            Marker::InFlight { count, .. } | Marker::Acknowledged { count } => count,
        }
    }

    pub fn is_outstanding(&self) -> bool {
        self.marker != Marker::Clear
    }

    /// Publish `report` and mark it in flight.
    ///
    /// Refused while another report is outstanding.  On any failure the
    /// marker stays clear.
    pub fn send(
        &mut self,
        report: &Report,
        link: &mut dyn TransportPort,
        now_ms: u64,
    ) -> Result<(), CommsError> {
        if self.is_outstanding() {
            warn!("Report refused: {} still outstanding", self.in_flight_count());
            return Err(CommsError::ReportOutstanding);
        }
        if !link.is_connected() {
            return Err(CommsError::NotConnected);
        }
        let body = report.to_json()?;
        link.publish(REPORT_TOPIC, &body)?;
        self.marker = Marker::InFlight {
            count: report.hourly,
            sent_at_ms: now_ms,
        };
        info!("Report sent: {}", body);
        Ok(())
    }

    /// Apply an acknowledgment payload.
    pub fn on_message(&mut self, payload: &str) -> AckOutcome {
        if payload.is_empty() {
            warn!("Acknowledgment carried no data");
            return AckOutcome::NoData;
        }
        let Marker::InFlight { count, .. } = self.marker else {
            debug!("Acknowledgment '{}' with nothing in flight, ignored", payload);
            return AckOutcome::Unsolicited;
        };
        let code = parse_status_code(payload);
        if code == 200 || code == 201 {
            self.marker = Marker::Acknowledged { count };
            info!("Report of {} acknowledged ({})", count, code);
            AckOutcome::Success { code }
        } else {
            warn!("Report rejected: {}", payload);
            AckOutcome::Failure { code }
        }
    }

    pub fn status(&self, now_ms: u64) -> UploadStatus {
        match self.marker {
            Marker::Clear => UploadStatus::Idle,
            Marker::Acknowledged { .. } => UploadStatus::Acknowledged,
            Marker::InFlight { sent_at_ms, .. } => {
                if now_ms.saturating_sub(sent_at_ms) > self.ack_wait_ms {
                    UploadStatus::TimedOut
                } else {
                    UploadStatus::Pending
                }
            }
        }
    }

    /// Hand out an acknowledged count exactly once and clear the marker.
    pub fn take_acknowledged(&mut self) -> Option<u16> {
        match self.marker {
            Marker::Acknowledged { count } => {
                self.marker = Marker::Clear;
                Some(count)
            }
            _ => None,
        }
    }

    /// Drop whatever is outstanding without reconciling it.
    pub fn abandon(&mut self) {
        if self.marker != Marker::Clear {
            warn!("Abandoning outstanding report of {}", self.in_flight_count());
        }
        self.marker = Marker::Clear;
    }
}

/// Leading-decimal parse: optional whitespace and sign, then digits up to
/// the first non-digit.  No digits yields 0.
fn parse_status_code(payload: &str) -> i32 {
    let s = payload.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i32, |acc, d| acc.saturating_mul(10).saturating_add(i32::from(d - b'0')));
    if negative { -value } else { value }
}
