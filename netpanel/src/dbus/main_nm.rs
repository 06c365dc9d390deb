//! Root `org.freedesktop.NetworkManager` object.

use std::collections::HashMap;
use zbus::proxy;
use zvariant::OwnedObjectPath;

/// Entry point of the adapter: finds the Wi-Fi device, starts and stops
/// activations, and lists what is currently active.
#[proxy(
    interface = "org.freedesktop.NetworkManager",
    default_service = "org.freedesktop.NetworkManager",
    default_path = "/org/freedesktop/NetworkManager"
)]
pub trait NM {
    /// Every device NetworkManager manages, wired ones included.
    fn get_devices(&self) -> zbus::Result<Vec<OwnedObjectPath>>;

    /// Resolves an interface name such as `wlan0` to its device path.
    fn get_device_by_ip_iface(&self, iface: &str) -> zbus::Result<OwnedObjectPath>;

    /// Activations currently in progress or established.
    #[zbus(property)]
    fn active_connections(&self) -> zbus::Result<Vec<OwnedObjectPath>>;

    /// Saves a fresh profile and starts it in one call.
    ///
    /// Used when no saved profile matches the SSID. Returns the profile path
    /// and the active connection path.
    fn add_and_activate_connection(
        &self,
        connection: HashMap<&str, HashMap<&str, zvariant::Value<'_>>>,
        device: OwnedObjectPath,
        specific_object: OwnedObjectPath,
    ) -> zbus::Result<(OwnedObjectPath, OwnedObjectPath)>;

    /// Starts a saved profile on `device`.
    fn activate_connection(
        &self,
        connection: OwnedObjectPath,
        device: OwnedObjectPath,
        specific_object: OwnedObjectPath,
    ) -> zbus::Result<OwnedObjectPath>;

    /// Tears down one activation; the device then settles to disconnected.
    fn deactivate_connection(&self, active_connection: OwnedObjectPath) -> zbus::Result<()>;
}
