//! Cellular cloud link adapter.
//!
//! - **`target_os = "espidf"`**: [`CloudLink`] drives the modem's power
//!   and reset lines and speaks MQTT over the modem's PPP interface via
//!   `esp-idf-svc`.  Topics are rooted at the device's
//!   [`topic_root`](super::device_id::topic_root); inbound topics are
//!   delivered relative to it (`hook-response`, `function/<name>`).
//!   Signal quality is sampled over the modem's AT channel before each
//!   session is opened and cached for the life of the session.
//! - **`not(target_os = "espidf")`**: [`SimLink`] records publishes and
//!   replays scripted inbound messages.

// ── ESP-IDF backend ───────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::CloudLink;

#[cfg(target_os = "espidf")]
mod esp {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use esp_idf_hal::delay::FreeRtos;
    use esp_idf_svc::mqtt::client::{
        Details, EspMqttClient, EventPayload, MqttClientConfiguration, QoS,
    };
    use log::{info, warn};

    use crate::adapters::device_id::TopicRoot;
    use crate::app::ports::{InboundMessage, TransportPort};
    use crate::drivers::hw_init::gpio_write;
    use crate::drivers::modem::{
        ATTENTION_COMMAND, AtChannel, CSQ_COMMAND, CSQ_TIMEOUT_MS, RESET_TIMEOUT_MS,
        SILENT_RESET_COMMAND, csq_to_dbm, parse_csq,
    };
    use crate::error::CommsError;
    use crate::pins;
    use crate::upload::ACK_TOPIC;

    /// Inbound messages held between two polls.
    const INBOX_CAP: usize = 8;
    /// Modem boot time after power is applied.
    const MODEM_BOOT_MS: u32 = 3_000;
    const RESET_PULSE_MS: u32 = 200;
    const CONNECT_POLL_MS: u32 = 100;

    pub struct CloudLink {
        broker_url: &'static str,
        root: TopicRoot,
        client: Option<EspMqttClient<'static>>,
        connected: Arc<AtomicBool>,
        inbox: Arc<Mutex<VecDeque<InboundMessage>>>,
        at: AtChannel,
        rssi: Option<i16>,
        powered: bool,
    }

    impl CloudLink {
        pub fn new(broker_url: &'static str, root: TopicRoot, at: AtChannel) -> Self {
            Self {
                broker_url,
                root,
                client: None,
                connected: Arc::new(AtomicBool::new(false)),
                inbox: Arc::new(Mutex::new(VecDeque::with_capacity(INBOX_CAP))),
                at,
                rssi: None,
                powered: false,
            }
        }

        /// Read `AT+CSQ` while the modem is still in command mode.
        fn sample_signal(&mut self) {
            self.rssi = match self.at.command(CSQ_COMMAND, CSQ_TIMEOUT_MS) {
                Ok(reply) => parse_csq(&reply).and_then(csq_to_dbm),
                Err(e) => {
                    warn!("Signal query failed: {}", e);
                    None
                }
            };
            info!("Signal: {:?} dBm", self.rssi);
        }

        fn open_client(&mut self) -> Result<(), CommsError> {
            let conf = MqttClientConfiguration {
                client_id: Some(self.root.trim_end_matches('/')),
                ..Default::default()
            };
            let connected = self.connected.clone();
            let inbox = self.inbox.clone();
            let root = self.root.clone();
            let client = EspMqttClient::new_cb(self.broker_url, &conf, move |event| {
                match event.payload() {
                    EventPayload::Connected(_) => connected.store(true, Ordering::Release),
                    EventPayload::Disconnected => connected.store(false, Ordering::Release),
                    EventPayload::Received {
                        topic: Some(topic),
                        data,
                        details: Details::Complete,
                        ..
                    } => {
                        let Some(relative) = topic.strip_prefix(root.as_str()) else {
                            return;
                        };
                        let Ok(payload) = core::str::from_utf8(data) else {
                            return;
                        };
                        if let Ok(mut q) = inbox.lock() {
                            if q.len() < INBOX_CAP {
                                q.push_back(InboundMessage::new(relative, payload));
                            }
                        }
                    }
                    _ => {}
                }
            })
            .map_err(|e| {
                warn!("MQTT client create failed: {:?}", e);
                CommsError::ConnectTimeout
            })?;
            self.client = Some(client);
            Ok(())
        }

        fn subscribe_all(&mut self) -> Result<(), CommsError> {
            let Some(client) = self.client.as_mut() else {
                return Err(CommsError::NotConnected);
            };
            for suffix in [ACK_TOPIC, "function/+"] {
                let topic = format!("{}{}", self.root, suffix);
                client
                    .subscribe(&topic, QoS::AtLeastOnce)
                    .map_err(|_| CommsError::ConnectTimeout)?;
            }
            Ok(())
        }
    }

    impl TransportPort for CloudLink {
        fn power_on(&mut self) {
            if self.powered {
                return;
            }
            gpio_write(pins::MODEM_POWER_GPIO, true);
            FreeRtos::delay_ms(MODEM_BOOT_MS);
            self.powered = true;
            info!("Modem powered on");
        }

        fn power_off(&mut self) {
            self.disconnect();
            gpio_write(pins::MODEM_POWER_GPIO, false);
            self.powered = false;
            info!("Modem powered off");
        }

        fn connect(&mut self, timeout_ms: u32) -> Result<(), CommsError> {
            if !self.powered {
                return Err(CommsError::NotConnected);
            }
            if self.client.is_none() {
                self.sample_signal();
                self.open_client()?;
            }
            let mut waited = 0;
            while !self.is_connected() {
                if waited >= timeout_ms {
                    warn!("Cloud connect timed out after {} ms", timeout_ms);
                    return Err(CommsError::ConnectTimeout);
                }
                FreeRtos::delay_ms(CONNECT_POLL_MS);
                waited += CONNECT_POLL_MS;
            }
            self.subscribe_all()?;
            info!("Cloud connected in {} ms", waited);
            Ok(())
        }

        fn disconnect(&mut self) {
            // Dropping the client closes the session.
            self.client = None;
            self.connected.store(false, Ordering::Release);
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::Acquire)
        }

        fn publish(&mut self, topic: &str, payload: &str) -> Result<(), CommsError> {
            if !self.is_connected() {
                return Err(CommsError::NotConnected);
            }
            let Some(client) = self.client.as_mut() else {
                return Err(CommsError::NotConnected);
            };
            let full = format!("{}{}", self.root, topic);
            client
                .publish(&full, QoS::AtLeastOnce, false, payload.as_bytes())
                .map(|_| ())
                .map_err(|_| CommsError::PublishFailed)
        }

        fn poll_message(&mut self) -> Option<InboundMessage> {
            self.inbox.lock().ok()?.pop_front()
        }

        fn rssi_dbm(&mut self) -> Option<i16> {
            if self.is_connected() { self.rssi } else { None }
        }

        fn reset_modem(&mut self) -> Result<(), CommsError> {
            self.disconnect();
            self.rssi = None;
            if self.at.expect_ok(SILENT_RESET_COMMAND, RESET_TIMEOUT_MS) {
                warn!("Modem silent reset accepted");
                return Ok(());
            }
            warn!("Silent reset not answered, pulsing reset line");
            gpio_write(pins::MODEM_RESET_GPIO, true);
            FreeRtos::delay_ms(RESET_PULSE_MS);
            gpio_write(pins::MODEM_RESET_GPIO, false);
            FreeRtos::delay_ms(MODEM_BOOT_MS);
            if self.at.expect_ok(ATTENTION_COMMAND, CSQ_TIMEOUT_MS) {
                Ok(())
            } else {
                Err(CommsError::ModemResetFailed)
            }
        }
    }
}

// ── Simulation backend ───────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub use sim::SimLink;

#[cfg(not(target_os = "espidf"))]
mod sim {
    use std::collections::VecDeque;

    use crate::app::ports::{InboundMessage, TransportPort};
    use crate::error::CommsError;

    /// Scriptable in-memory link.
    #[derive(Debug, Default)]
    pub struct SimLink {
        powered: bool,
        connected: bool,
        failing_connects: u32,
        sticky: bool,
        publish_fails: bool,
        rssi: Option<i16>,
        published: Vec<(String, String)>,
        inbox: VecDeque<InboundMessage>,
        connects: u32,
        modem_resets: u32,
        reset_fails: bool,
    }

    impl SimLink {
        pub fn new() -> Self {
            Self {
                rssi: Some(-75),
                ..Self::default()
            }
        }

        /// Every publish so far as `(topic, payload)`.
        pub fn published(&self) -> &[(String, String)] {
            &self.published
        }

        /// Payloads published under `topic`.
        pub fn published_on<'a>(&'a self, topic: &'a str) -> impl Iterator<Item = &'a str> + 'a {
            self.published
                .iter()
                .filter(move |(t, _)| t == topic)
                .map(|(_, p)| p.as_str())
        }

        pub fn clear_published(&mut self) {
            self.published.clear();
        }

        /// Queue a message as if the cloud had sent it.
        pub fn deliver(&mut self, topic: &str, payload: &str) {
            self.inbox.push_back(InboundMessage::new(topic, payload));
        }

        /// The next `n` connect attempts time out.
        pub fn fail_next_connects(&mut self, n: u32) {
            self.failing_connects = n;
        }

        /// The session survives `disconnect()` (only a modem reset ends it).
        pub fn set_sticky(&mut self, sticky: bool) {
            self.sticky = sticky;
        }

        pub fn set_publish_fails(&mut self, fails: bool) {
            self.publish_fails = fails;
        }

        /// The modem stops answering, so resets fail.
        pub fn set_reset_fails(&mut self, fails: bool) {
            self.reset_fails = fails;
        }

        pub fn set_rssi(&mut self, rssi: Option<i16>) {
            self.rssi = rssi;
        }

        pub fn is_powered(&self) -> bool {
            self.powered
        }

        pub fn connects(&self) -> u32 {
            self.connects
        }

        pub fn modem_resets(&self) -> u32 {
            self.modem_resets
        }
    }

    impl TransportPort for SimLink {
        fn power_on(&mut self) {
            self.powered = true;
        }

        fn power_off(&mut self) {
            self.connected = false;
            self.powered = false;
        }

        fn connect(&mut self, _timeout_ms: u32) -> Result<(), CommsError> {
            if !self.powered {
                return Err(CommsError::NotConnected);
            }
            if self.failing_connects > 0 {
                self.failing_connects -= 1;
                return Err(CommsError::ConnectTimeout);
            }
            self.connected = true;
            self.connects += 1;
            Ok(())
        }

        fn disconnect(&mut self) {
            if !self.sticky {
                self.connected = false;
            }
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn publish(&mut self, topic: &str, payload: &str) -> Result<(), CommsError> {
            if !self.connected {
                return Err(CommsError::NotConnected);
            }
            if self.publish_fails {
                return Err(CommsError::PublishFailed);
            }
            self.published.push((topic.to_owned(), payload.to_owned()));
            Ok(())
        }

        fn poll_message(&mut self) -> Option<InboundMessage> {
            self.inbox.pop_front()
        }

        fn rssi_dbm(&mut self) -> Option<i16> {
            if self.connected { self.rssi } else { None }
        }

        fn reset_modem(&mut self) -> Result<(), CommsError> {
            self.modem_resets += 1;
            self.connected = false;
            self.sticky = false;
            if self.reset_fails {
                return Err(CommsError::ModemResetFailed);
            }
            Ok(())
        }
    }
}
