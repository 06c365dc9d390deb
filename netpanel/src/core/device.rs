//! Wireless device enumeration and addressing details.

use log::{debug, warn};
use zbus::Connection;
use zvariant::OwnedObjectPath;

use crate::Result;
use crate::api::models::{ActiveConnectionDetails, ConnectionError};
use crate::dbus::{NMDeviceProxy, NMIpConfigProxy, NMProxy};
use crate::types::constants::{device_type, paths};
use crate::util::utils::first_address;

const IP6_CONFIG_INTERFACE: &str = "org.freedesktop.NetworkManager.IP6Config";

/// A wireless device with its resolved interface name.
pub(crate) struct WifiDevice {
    pub path: OwnedObjectPath,
    pub interface: String,
}

/// Lists every Wi-Fi device managed by NetworkManager.
///
/// Devices whose type or interface cannot be read are logged and skipped.
/// Returns [`ConnectionError::NoWifiDevice`] when nothing is left.
pub(crate) async fn wifi_devices(conn: &Connection) -> Result<Vec<WifiDevice>> {
    let nm = NMProxy::new(conn).await?;
    let mut found = Vec::new();

    for path in nm.get_devices().await? {
        let dev = NMDeviceProxy::builder(conn)
            .path(path.clone())?
            .build()
            .await?;

        match dev.device_type().await {
            Ok(device_type::WIFI) => {}
            Ok(_) => continue,
            Err(e) => {
                warn!("Failed to read type of device {}: {e}", path.as_str());
                continue;
            }
        }

        match dev.interface().await {
            Ok(interface) => found.push(WifiDevice { path, interface }),
            Err(e) => warn!("Failed to read interface of {}: {e}", path.as_str()),
        }
    }

    if found.is_empty() {
        return Err(ConnectionError::NoWifiDevice);
    }
    Ok(found)
}

/// Resolves a device path from its interface name.
pub(crate) async fn device_path(conn: &Connection, interface: &str) -> Result<OwnedObjectPath> {
    let nm = NMProxy::new(conn).await?;
    Ok(nm.get_device_by_ip_iface(interface).await?)
}

async fn address_of(conn: &Connection, config: OwnedObjectPath, v6: bool) -> Option<String> {
    if config.as_str() == paths::NONE {
        return None;
    }
    let builder = crate::try_log!(
        NMIpConfigProxy::builder(conn).path(config),
        "Failed to address IP config"
    );
    let builder = if v6 {
        crate::try_log!(builder.interface(IP6_CONFIG_INTERFACE), "Bad IP6 interface")
    } else {
        builder
    };
    let proxy = crate::try_log!(builder.build().await, "Failed to build IP config proxy");
    let entries = crate::try_log!(proxy.address_data().await, "Failed to read AddressData");
    first_address(&entries)
}

/// Reads IPv4/IPv6 addresses and the hardware address of a device.
///
/// The permanent hardware address is preferred; drivers that do not expose
/// one fall back to the current address.
pub(crate) async fn device_details(
    conn: &Connection,
    interface: &str,
) -> Result<ActiveConnectionDetails> {
    let path = device_path(conn, interface).await?;
    let dev = NMDeviceProxy::builder(conn).path(path)?.build().await?;

    let ipv4 = match dev.ip4_config().await {
        Ok(cfg) => address_of(conn, cfg, false).await,
        Err(e) => {
            debug!("No IPv4 config on {interface}: {e}");
            None
        }
    };
    let ipv6 = match dev.ip6_config().await {
        Ok(cfg) => address_of(conn, cfg, true).await,
        Err(e) => {
            debug!("No IPv6 config on {interface}: {e}");
            None
        }
    };

    let mac = match dev.perm_hw_address().await {
        Ok(addr) if !addr.is_empty() => Some(addr),
        _ => dev.hw_address().await.ok(),
    };

    Ok(ActiveConnectionDetails::new(interface, ipv4, ipv6, mac))
}
