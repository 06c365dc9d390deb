//! Generic `Device` interface, shared by every device type.

use zbus::{Result, proxy};
use zvariant::OwnedObjectPath;

/// Source of the details pane: interface name, addresses, MAC and the
/// device state the disconnect path waits on.
#[proxy(
    interface = "org.freedesktop.NetworkManager.Device",
    default_service = "org.freedesktop.NetworkManager"
)]
pub trait NMDevice {
    /// Kernel interface name.
    #[zbus(property)]
    fn interface(&self) -> Result<String>;

    /// Device type as a numeric code (2 = Wi-Fi).
    #[zbus(property)]
    fn device_type(&self) -> Result<u32>;

    /// Current device state (30 = disconnected, 100 = activated).
    #[zbus(property)]
    fn state(&self) -> Result<u32>;

    /// Current hardware (MAC) address.
    #[zbus(property)]
    fn hw_address(&self) -> Result<String>;

    /// Permanent hardware address; not exposed by every driver.
    #[zbus(property, name = "PermHwAddress")]
    fn perm_hw_address(&self) -> Result<String>;

    /// Path to the IPv4 configuration ("/" if none).
    #[zbus(property)]
    fn ip4_config(&self) -> Result<OwnedObjectPath>;

    /// Path to the IPv6 configuration ("/" if none).
    #[zbus(property)]
    fn ip6_config(&self) -> Result<OwnedObjectPath>;

    /// Fired on every transition; see `device_state` for the codes.
    #[zbus(signal, name = "StateChanged")]
    fn device_state_changed(&self, new_state: u32, old_state: u32, reason: u32);
}
