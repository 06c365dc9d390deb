//! NetworkManager IP4Config / IP6Config proxy.

use std::collections::HashMap;
use zbus::{proxy, Result};
use zvariant::OwnedValue;

/// Proxy for an IPv4 configuration object.
///
/// IPv6 configurations expose the same `AddressData` shape; the adapter
/// builds this proxy with the IP6Config interface name for those.
#[proxy(
    interface = "org.freedesktop.NetworkManager.IP4Config",
    default_service = "org.freedesktop.NetworkManager"
)]
pub trait NMIpConfig {
    /// Address entries, each with at least `address` and `prefix` keys.
    #[zbus(property)]
    fn address_data(&self) -> Result<Vec<HashMap<String, OwnedValue>>>;
}
