//! Device identity derived from the ESP32 factory MAC address.
//!
//! The advertised local name is `tempnode-xxyyzz`, built from the last three
//! bytes of the factory-burned eFuse MAC so it is stable across reboots and
//! distinguishes nodes in a scanner list.

use core::fmt::Write;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// `tempnode-` plus six hex digits.
pub type AdvName = heapless::String<16>;

const NAME_PREFIX: &str = "tempnode-";

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: writes exactly six bytes into `mac`.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0x24, 0x6F, 0x28, 0x1A, 0x2B, 0x3C]
}

/// Advertised local name, e.g. `tempnode-1a2b3c`.
pub fn adv_name(mac: &MacAddress) -> AdvName {
    let mut name = AdvName::new();
    // 9 + 6 chars always fit in 16.
    let _ = write!(name, "{}{:02x}{:02x}{:02x}", NAME_PREFIX, mac[3], mac[4], mac[5]);
    name
}
