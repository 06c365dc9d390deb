//! Wi-Fi network scanning and enumeration.
//!
//! Triggers a rescan on every wireless device, reads the visible access
//! points and resolves the active association.

use futures_timer::Delay;
use log::{debug, warn};
use std::collections::HashMap;
use zbus::Connection;
use zvariant::OwnedObjectPath;

use crate::Result;
use crate::api::models::{AccessPointRef, ActiveLink, ConnectionError, NetworkSummary, Security};
use crate::core::device::{WifiDevice, wifi_devices};
use crate::dbus::{
    NMAccessPointProxy, NMActiveConnectionProxy, NMDeviceProxy, NMProxy, NMWirelessProxy,
};
use crate::types::constants::{paths, settings, timeouts};
use crate::util::utils::decode_ssid;

/// One access point read from the bus.
struct ApSnapshot {
    path: OwnedObjectPath,
    ssid: String,
    strength: u8,
    security: Security,
}

async fn read_ap(conn: &Connection, path: OwnedObjectPath) -> Result<Option<ApSnapshot>> {
    let ap = NMAccessPointProxy::builder(conn)
        .path(path.clone())?
        .build()
        .await?;

    let Some(ssid) = decode_ssid(&ap.ssid().await?) else {
        return Ok(None);
    };
    let security = Security::from_flags(
        ap.flags().await?,
        ap.wpa_flags().await?,
        ap.rsn_flags().await?,
    );

    Ok(Some(ApSnapshot {
        path,
        ssid,
        strength: ap.strength().await?,
        security,
    }))
}

async fn device_access_points(conn: &Connection, dev: &WifiDevice) -> Result<Vec<ApSnapshot>> {
    let wifi = NMWirelessProxy::builder(conn)
        .path(dev.path.clone())?
        .build()
        .await?;

    let mut out = Vec::new();
    for path in wifi.access_points().await? {
        match read_ap(conn, path).await {
            Ok(Some(ap)) => out.push(ap),
            Ok(None) => {}
            // Access points can disappear between listing and reading.
            Err(e) => debug!("Skipping access point: {e}"),
        }
    }
    Ok(out)
}

/// Requests a scan on every wireless device.
///
/// Scan requests are rate limited by NetworkManager; a refused request is
/// logged and the cached results are used.
pub(crate) async fn request_scans(conn: &Connection, devices: &[WifiDevice]) {
    for dev in devices {
        let wifi = match NMWirelessProxy::builder(conn).path(dev.path.clone()) {
            Ok(builder) => builder.build().await,
            Err(e) => Err(e),
        };
        match wifi {
            Ok(wifi) => {
                if let Err(e) = wifi.request_scan(HashMap::new()).await {
                    debug!("Scan request on {} refused: {e}", dev.interface);
                }
            }
            Err(e) => warn!("Failed to reach wireless interface {}: {e}", dev.interface),
        }
    }
}

/// Lists visible networks across all wireless devices.
///
/// A failing device is logged and skipped so the caller still gets partial
/// results. With no wireless device at all the list is empty.
pub(crate) async fn list_networks(conn: &Connection) -> Result<Vec<NetworkSummary>> {
    let devices = match wifi_devices(conn).await {
        Ok(devices) => devices,
        Err(ConnectionError::NoWifiDevice) => {
            warn!("No Wi-Fi device present, returning an empty list");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    request_scans(conn, &devices).await;
    Delay::new(timeouts::scan_wait()).await;

    // Strongest access point wins for an SSID seen more than once.
    let mut by_ssid: HashMap<String, NetworkSummary> = HashMap::new();
    for dev in &devices {
        let aps = match device_access_points(conn, dev).await {
            Ok(aps) => aps,
            Err(e) => {
                warn!("Failed to enumerate access points on {}: {e}", dev.interface);
                continue;
            }
        };
        for ap in aps {
            let entry = NetworkSummary::new(ap.ssid.clone(), Some(ap.strength), ap.security);
            by_ssid
                .entry(ap.ssid)
                .and_modify(|known| {
                    if known.signal < entry.signal {
                        *known = entry.clone();
                    }
                })
                .or_insert(entry);
        }
    }

    debug!("Found {} networks", by_ssid.len());
    Ok(by_ssid.into_values().collect())
}

/// An active wireless connection together with its bus objects.
pub(crate) struct ActiveWireless {
    pub link: ActiveLink,
    pub active_connection: OwnedObjectPath,
    pub device: OwnedObjectPath,
}

/// Finds the first active wireless connection bound to an access point.
pub(crate) async fn active_wireless(conn: &Connection) -> Result<Option<ActiveWireless>> {
    let nm = NMProxy::new(conn).await?;

    for ac_path in nm.active_connections().await? {
        let ac = NMActiveConnectionProxy::builder(conn)
            .path(ac_path.clone())?
            .build()
            .await?;

        match ac.connection_type().await {
            Ok(kind) if kind == settings::WIRELESS => {}
            Ok(_) => continue,
            Err(e) => {
                debug!("Skipping active connection {}: {e}", ac_path.as_str());
                continue;
            }
        }

        for dev_path in ac.devices().await? {
            if let Some(link) = link_on_device(conn, dev_path.clone()).await? {
                return Ok(Some(ActiveWireless {
                    link,
                    active_connection: ac_path,
                    device: dev_path,
                }));
            }
        }
    }

    Ok(None)
}

/// Returns the first active wireless connection and its interface.
pub(crate) async fn active_link(conn: &Connection) -> Result<Option<ActiveLink>> {
    Ok(active_wireless(conn).await?.map(|active| active.link))
}

async fn link_on_device(
    conn: &Connection,
    dev_path: OwnedObjectPath,
) -> Result<Option<ActiveLink>> {
    let wifi = NMWirelessProxy::builder(conn)
        .path(dev_path.clone())?
        .build()
        .await?;
    let ap_path = wifi.active_access_point().await?;
    if ap_path.as_str() == paths::NONE {
        return Ok(None);
    }

    let ap = NMAccessPointProxy::builder(conn)
        .path(ap_path)?
        .build()
        .await?;
    let Some(ssid) = decode_ssid(&ap.ssid().await?) else {
        return Ok(None);
    };

    let dev = NMDeviceProxy::builder(conn).path(dev_path)?.build().await?;
    Ok(Some(ActiveLink {
        ssid,
        device: dev.interface().await?,
    }))
}

/// Finds the strongest access point broadcasting `ssid`.
///
/// Uses the access points from the last scan; a network that vanished since
/// the list was shown yields [`ConnectionError::NotFound`].
pub(crate) async fn locate(conn: &Connection, ssid: &str) -> Result<AccessPointRef> {
    let mut best: Option<(ApSnapshot, &WifiDevice)> = None;
    let devices = wifi_devices(conn).await?;

    for dev in &devices {
        let aps = match device_access_points(conn, dev).await {
            Ok(aps) => aps,
            Err(e) => {
                warn!("Failed to enumerate access points on {}: {e}", dev.interface);
                continue;
            }
        };
        for ap in aps.into_iter().filter(|ap| ap.ssid == ssid) {
            if best.as_ref().is_none_or(|(b, _)| b.strength < ap.strength) {
                best = Some((ap, dev));
            }
        }
    }

    let (ap, dev) = best.ok_or_else(|| ConnectionError::NotFound(ssid.to_string()))?;
    debug!("Matched '{ssid}' to {} on {}", ap.path.as_str(), dev.interface);
    Ok(AccessPointRef {
        ssid: ap.ssid,
        device: dev.interface.clone(),
        locator: ap.path.to_string(),
        security: ap.security,
    })
}
