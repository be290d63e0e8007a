//! Metered diagnostic publishes.
//!
//! Verbose-mode notices (state transitions, count echoes, anomalies) go out
//! over the cellular link, which the cloud rate-limits per device.  A
//! token bucket keeps us under that limit; a notice over budget is dropped
//! rather than blocking the control loop.

use burster::Limiter;
use core::time::Duration;
use log::debug;

use crate::app::ports::TransportPort;
use crate::config::timing;

pub struct Notifier {
    bucket: burster::TokenBucket<fn() -> Duration>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            bucket: burster::TokenBucket::new_with_time_provider(
                timing::NOTICE_RATE_PER_SEC,
                timing::NOTICE_BURST,
                platform_now as fn() -> Duration,
            ),
        }
    }

    /// Publish `payload` under `topic` if the link is up and the budget
    /// allows.  Returns whether it went out.
    pub fn publish(&mut self, link: &mut dyn TransportPort, topic: &str, payload: &str) -> bool {
        if !link.is_connected() {
            return false;
        }
        if self.bucket.try_consume(1).is_err() {
            debug!("Notice dropped (rate): {} / {}", topic, payload);
            return false;
        }
        match link.publish(topic, payload) {
            Ok(()) => true,
            Err(e) => {
                debug!("Notice publish failed: {}", e);
                false
            }
        }
    }
}

// ── Platform time for the bucket ─────────────────────────────

#[cfg(target_os = "espidf")]
fn platform_now() -> Duration {
    let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
    Duration::from_micros(us as u64)
}

#[cfg(not(target_os = "espidf"))]
fn platform_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cloud::SimLink;

    #[test]
    fn silent_while_disconnected() {
        let mut link = SimLink::new();
        let mut n = Notifier::new();
        assert!(!n.publish(&mut link, "State", "x"));
        assert!(link.published().is_empty());
    }

    #[test]
    fn burst_budget_exhausts() {
        let mut link = SimLink::new();
        link.power_on();
        link.connect(1_000).unwrap();
        let mut n = Notifier::new();
        for _ in 0..timing::NOTICE_BURST {
            assert!(n.publish(&mut link, "State", "x"));
        }
        assert!(!n.publish(&mut link, "State", "x"));
        assert_eq!(link.published().len(), timing::NOTICE_BURST as usize);
    }
}
