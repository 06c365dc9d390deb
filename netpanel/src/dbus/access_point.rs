//! NetworkManager Access Point proxy.

use zbus::{proxy, Result};

/// Proxy for access point interface.
///
/// One broadcast instance of a wireless network: raw SSID bytes, signal
/// strength and the capability flags used to classify its security.
#[proxy(
    interface = "org.freedesktop.NetworkManager.AccessPoint",
    default_service = "org.freedesktop.NetworkManager"
)]
pub trait NMAccessPoint {
    /// SSID as raw bytes (may not be valid UTF-8).
    #[zbus(property)]
    fn ssid(&self) -> Result<Vec<u8>>;

    /// Signal strength as percentage (0-100).
    #[zbus(property)]
    fn strength(&self) -> Result<u8>;

    /// 802.11 capability flags (bit 0 = privacy).
    #[zbus(property)]
    fn flags(&self) -> Result<u32>;

    /// WPA security flags.
    #[zbus(property)]
    fn wpa_flags(&self) -> Result<u32>;

    /// RSN (WPA2/WPA3) security flags.
    #[zbus(property)]
    fn rsn_flags(&self) -> Result<u32>;
}
