//! Device identity derived from the ESP32 factory MAC address.
//!
//! Produces a stable device ID in the form `OC-XXYYZZ` (last 3 bytes of
//! the 6-byte MAC in uppercase hex).  Several counters share one cloud
//! integration, so every topic the device publishes or subscribes to is
//! rooted at `occucount/<id>/`, which keeps acknowledgments and console
//! calls addressed to the right unit.

use core::fmt::Write;

/// Fixed-size device ID string: "OC-XXYYZZ".
pub type DeviceIdString = heapless::String<16>;

/// Topic prefix, e.g. `occucount/OC-AABBCC/`.
pub type TopicRoot = heapless::String<32>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

const TOPIC_NAMESPACE: &str = "occucount";

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Derive the short device ID from the last 3 MAC bytes.
pub fn device_id(mac: &MacAddress) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    let _ = write!(id, "OC-{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]);
    id
}

/// Root every device topic hangs off, with trailing slash.
pub fn topic_root(id: &str) -> TopicRoot {
    let mut root = TopicRoot::new();
    let _ = write!(root, "{}/{}/", TOPIC_NAMESPACE, id);
    root
}
