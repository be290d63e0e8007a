//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements     | Connects to                        |
//! |--------------|----------------|------------------------------------|
//! | `board`      | BoardPort      | Sensor, watchdog, switch, LED, ADC |
//! | `cloud`      | TransportPort  | Cellular modem + MQTT broker       |
//! | `fram`       | RegisterStore  | I2C FRAM                           |
//! | `fuel_gauge` | PowerPort      | MAX17043 gauge, BQ24195 charger    |
//! | `log_sink`   | EventSink      | Serial log output                  |
//! | `system`     | SleepPort      | Light/deep sleep, restart, delays  |
//! | `time`       | Clock          | RTC wall clock + uptime timer      |
//!
//! `device_id` derives the unit's identity and topic root from the MAC.
//! Every adapter except `log_sink` and `device_id` has an ESP-IDF backend
//! and a simulation backend selected by `target_os`.

pub mod board;
pub mod cloud;
pub mod device_id;
pub mod fram;
pub mod fuel_gauge;
pub mod log_sink;
pub mod system;
pub mod time;
