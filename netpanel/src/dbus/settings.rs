//! NetworkManager Settings and Settings.Connection proxies.

use std::collections::HashMap;
use zbus::{proxy, Result};
use zvariant::{OwnedObjectPath, OwnedValue};

/// Nested settings map as returned by `GetSettings` / `GetSecrets`.
pub type SettingsMap = HashMap<String, HashMap<String, OwnedValue>>;

/// Proxy for the settings service holding saved connection profiles.
#[proxy(
    interface = "org.freedesktop.NetworkManager.Settings",
    default_service = "org.freedesktop.NetworkManager",
    default_path = "/org/freedesktop/NetworkManager/Settings"
)]
pub trait NMSettings {
    /// Paths to every saved connection profile.
    fn list_connections(&self) -> Result<Vec<OwnedObjectPath>>;
}

/// Proxy for one saved connection profile.
#[proxy(
    interface = "org.freedesktop.NetworkManager.Settings.Connection",
    default_service = "org.freedesktop.NetworkManager"
)]
pub trait NMSettingsConnection {
    /// Settings without secrets.
    fn get_settings(&self) -> Result<SettingsMap>;

    /// Secrets of one setting, e.g. "802-11-wireless-security".
    fn get_secrets(&self, setting_name: &str) -> Result<SettingsMap>;
}
