//! Wi-Fi connect and disconnect flows.

use futures_timer::Delay;
use log::{debug, info, warn};
use zbus::Connection;
use zvariant::OwnedObjectPath;

use crate::Result;
use crate::api::models::{AccessPointRef, ConnectionError};
use crate::core::connection_settings::{build_wifi_connection, get_saved_connection_path};
use crate::core::device::device_path;
use crate::core::scan::{active_link, active_wireless};
use crate::core::state_wait::{wait_for_connection_activation, wait_for_device_disconnect};
use crate::dbus::{NMDeviceProxy, NMProxy};
use crate::types::constants::timeouts;

/// Decision on whether to reuse a saved profile or create a fresh one.
#[derive(Debug, PartialEq)]
enum SavedDecision {
    /// Reuse the saved profile at this path.
    UseSaved(OwnedObjectPath),
    /// Create a new profile carrying the supplied credential.
    CreateNew,
}

/// A supplied password always wins over a saved profile so a corrected
/// credential replaces a stale one.
fn decide_saved_connection(
    saved: Option<OwnedObjectPath>,
    password: Option<&str>,
) -> SavedDecision {
    match (saved, password) {
        (Some(path), None) => SavedDecision::UseSaved(path),
        _ => SavedDecision::CreateNew,
    }
}

/// Connects the device in `ap` to the network.
///
/// Saved profiles are re-activated as they are; otherwise a new profile is
/// created and activated in one call. Either way the call returns only after
/// the activation settles.
pub(crate) async fn connect(
    conn: &Connection,
    ssid: &str,
    ap: &AccessPointRef,
    password: Option<&str>,
) -> Result<()> {
    debug!("Connecting to '{ssid}' via {} on {}", ap.locator, ap.device);

    if let Some(link) = active_link(conn).await? {
        if link.ssid == ssid {
            debug!("Already connected to '{ssid}', skipping connect()");
            return Ok(());
        }
    }

    let nm = NMProxy::new(conn).await?;
    let wifi_device = device_path(conn, &ap.device).await?;
    let specific_object = OwnedObjectPath::try_from(ap.locator.as_str())?;

    let saved = get_saved_connection_path(conn, ssid).await?;
    let active_conn = match decide_saved_connection(saved, password) {
        SavedDecision::UseSaved(saved) => {
            debug!("Activating saved connection: {}", saved.as_str());
            nm.activate_connection(saved, wifi_device, specific_object)
                .await?
        }
        SavedDecision::CreateNew => {
            let settings = build_wifi_connection(ssid, password);
            let (_, active_conn) = nm
                .add_and_activate_connection(settings, wifi_device, specific_object)
                .await?;
            active_conn
        }
    };

    if let Err(e) = wait_for_connection_activation(conn, &active_conn).await {
        warn!("Activation of '{ssid}' failed: {e}");
        if let Err(de) = nm.deactivate_connection(active_conn).await {
            debug!("Cleanup deactivation failed: {de}");
        }
        return Err(e);
    }

    info!("Successfully connected to '{ssid}'");
    Ok(())
}

/// Deactivates the active connection carrying `ssid` and waits for its
/// device to settle.
pub(crate) async fn disconnect(conn: &Connection, ssid: &str) -> Result<()> {
    let active = match active_wireless(conn).await? {
        Some(active) if active.link.ssid == ssid => active,
        _ => return Err(ConnectionError::NotConnected(ssid.to_string())),
    };

    let nm = NMProxy::new(conn).await?;
    let dev = NMDeviceProxy::builder(conn)
        .path(active.device)?
        .build()
        .await?;

    debug!("Deactivating {} on {}", active.active_connection.as_str(), active.link.device);
    nm.deactivate_connection(active.active_connection).await?;
    wait_for_device_disconnect(&dev).await?;

    // Let NetworkManager publish the new state before the follow-up refresh.
    Delay::new(timeouts::stabilization_delay()).await;

    info!("Disconnected from '{ssid}'");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> OwnedObjectPath {
        OwnedObjectPath::try_from(p).unwrap()
    }

    #[test]
    fn saved_profile_reused_without_password() {
        let saved = path("/org/freedesktop/NetworkManager/Settings/3");
        assert_eq!(
            decide_saved_connection(Some(saved.clone()), None),
            SavedDecision::UseSaved(saved)
        );
    }

    #[test]
    fn supplied_password_creates_new_profile() {
        let saved = path("/org/freedesktop/NetworkManager/Settings/3");
        assert_eq!(
            decide_saved_connection(Some(saved), Some("hunter2")),
            SavedDecision::CreateNew
        );
        assert_eq!(decide_saved_connection(None, None), SavedDecision::CreateNew);
        assert_eq!(
            decide_saved_connection(None, Some("hunter2")),
            SavedDecision::CreateNew
        );
    }
}
