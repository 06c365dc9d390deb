//! Utility functions for NetworkManager data conversion.
//!
//! Provides helpers for decoding SSID bytes, reading `AddressData` entries
//! and pulling strings out of settings maps.

use log::warn;
use std::collections::HashMap;
use std::str;
use zvariant::{OwnedValue, Value};

use crate::dbus::SettingsMap;

/// Decodes SSID bytes. Returns `None` for hidden networks (empty SSID) and
/// for SSIDs that are not valid UTF-8.
pub(crate) fn decode_ssid(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }

    match str::from_utf8(bytes) {
        Ok(s) if !s.trim().is_empty() => Some(s.to_owned()),
        Ok(_) => None,
        Err(e) => {
            warn!("Invalid UTF-8 in SSID: {e}");
            None
        }
    }
}

/// Decodes SSID bytes for comparison purposes, defaulting to an empty string.
pub(crate) fn decode_ssid_or_empty(bytes: &[u8]) -> String {
    decode_ssid(bytes).unwrap_or_default()
}

/// Strips a `/prefix` suffix from an address in CIDR notation.
pub(crate) fn strip_prefix(address: &str) -> &str {
    address.split('/').next().unwrap_or(address).trim()
}

/// Returns the `address` field of the first `AddressData` entry.
pub(crate) fn first_address(entries: &[HashMap<String, OwnedValue>]) -> Option<String> {
    let address = value_str(entries.first()?.get("address")?)?;
    let address = strip_prefix(&address).to_string();
    (!address.is_empty()).then_some(address)
}

/// Reads a string value out of a nested settings map.
pub(crate) fn settings_str(map: &SettingsMap, section: &str, key: &str) -> Option<String> {
    value_str(map.get(section)?.get(key)?)
}

/// Reads a byte array value (such as an SSID) out of a nested settings map.
pub(crate) fn settings_bytes(map: &SettingsMap, section: &str, key: &str) -> Option<Vec<u8>> {
    match &**map.get(section)?.get(key)? {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::U8(b) => Some(*b),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

fn value_str(value: &OwnedValue) -> Option<String> {
    match &**value {
        Value::Str(s) => Some(s.as_str().to_string()),
        _ => None,
    }
}

/// Macro to convert Result to Option with error logging.
/// Usage: `try_log!(result, "context message")`
#[macro_export]
macro_rules! try_log {
    ($result:expr, $context:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => {
                log::warn!("{}: {:?}", $context, e);
                return None;
            }
        }
    };
}
