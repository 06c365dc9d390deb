//! Saved connection profile management.
//!
//! Finds saved NetworkManager profiles by SSID, reads their stored secret and
//! builds the settings dictionary for a new infrastructure-mode profile.

use log::debug;
use std::collections::HashMap;
use uuid::Uuid;
use zbus::Connection;
use zvariant::{OwnedObjectPath, Value};

use crate::Result;
use crate::dbus::{NMSettingsConnectionProxy, NMSettingsProxy, SettingsMap};
use crate::types::constants::settings;
use crate::util::utils::{decode_ssid_or_empty, settings_bytes, settings_str};

/// Settings dictionary accepted by `AddAndActivateConnection`.
pub(crate) type NewConnectionSettings =
    HashMap<&'static str, HashMap<&'static str, Value<'static>>>;

/// Returns `true` when a saved profile's settings belong to `ssid`.
///
/// Profiles match either by their wireless SSID or, for profiles created by
/// older tools without an SSID section, by connection id.
pub(crate) fn profile_matches(map: &SettingsMap, ssid: &str) -> bool {
    if let Some(raw) = settings_bytes(map, settings::WIRELESS, "ssid") {
        return decode_ssid_or_empty(&raw) == ssid;
    }
    settings_str(map, settings::CONNECTION, "id").as_deref() == Some(ssid)
}

/// Finds the D-Bus path of a saved connection by SSID.
///
/// Returns `None` if no saved connection exists for this SSID. Profiles whose
/// settings cannot be read are skipped.
pub(crate) async fn get_saved_connection_path(
    conn: &Connection,
    ssid: &str,
) -> Result<Option<OwnedObjectPath>> {
    let settings_proxy = NMSettingsProxy::new(conn).await?;

    for cpath in settings_proxy.list_connections().await? {
        let cproxy = NMSettingsConnectionProxy::builder(conn)
            .path(cpath.clone())?
            .build()
            .await?;

        let map = match cproxy.get_settings().await {
            Ok(map) => map,
            Err(e) => {
                debug!("Skipping unreadable profile {}: {e}", cpath.as_str());
                continue;
            }
        };

        if profile_matches(&map, ssid) {
            return Ok(Some(cpath));
        }
    }

    Ok(None)
}

/// Checks whether a saved connection exists for the given SSID.
pub(crate) async fn has_saved_connection(conn: &Connection, ssid: &str) -> Result<bool> {
    get_saved_connection_path(conn, ssid)
        .await
        .map(|p| p.is_some())
}

/// Reads the pre-shared key stored in the saved profile for `ssid`.
///
/// Returns `None` when there is no profile, the profile has no security
/// section, or the secret agent refuses to hand the key out.
pub(crate) async fn stored_psk(conn: &Connection, ssid: &str) -> Result<Option<String>> {
    let Some(path) = get_saved_connection_path(conn, ssid).await? else {
        debug!("No saved profile for '{ssid}'");
        return Ok(None);
    };

    let cproxy = NMSettingsConnectionProxy::builder(conn)
        .path(path)?
        .build()
        .await?;

    match cproxy.get_secrets(settings::WIRELESS_SECURITY).await {
        Ok(secrets) => Ok(settings_str(&secrets, settings::WIRELESS_SECURITY, "psk")),
        Err(e) => {
            debug!("No secrets available for '{ssid}': {e}");
            Ok(None)
        }
    }
}

/// Builds the settings for a new infrastructure-mode Wi-Fi profile.
///
/// A `wpa-psk` security section is added only when a password is given.
pub(crate) fn build_wifi_connection(ssid: &str, password: Option<&str>) -> NewConnectionSettings {
    let mut connection = HashMap::new();
    connection.insert("type", Value::from(settings::WIRELESS));
    connection.insert("id", Value::from(ssid.to_string()));
    connection.insert("uuid", Value::from(Uuid::new_v4().to_string()));
    connection.insert("autoconnect", Value::from(true));

    let mut wireless = HashMap::new();
    wireless.insert("ssid", Value::from(ssid.as_bytes().to_vec()));
    wireless.insert("mode", Value::from(settings::INFRASTRUCTURE));

    let mut ipv4 = HashMap::new();
    ipv4.insert("method", Value::from("auto"));
    let mut ipv6 = HashMap::new();
    ipv6.insert("method", Value::from("auto"));

    let mut out = HashMap::new();

    if let Some(psk) = password {
        let mut security = HashMap::new();
        security.insert("key-mgmt", Value::from(settings::KEY_MGMT_PSK));
        security.insert("psk", Value::from(psk.to_string()));
        wireless.insert("security", Value::from(settings::WIRELESS_SECURITY));
        out.insert(settings::WIRELESS_SECURITY, security);
    }

    out.insert(settings::CONNECTION, connection);
    out.insert(settings::WIRELESS, wireless);
    out.insert("ipv4", ipv4);
    out.insert("ipv6", ipv6);
    out
}
