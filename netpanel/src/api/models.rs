use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

use crate::types::constants::placeholders;

bitflags! {
    /// 802.11 access point capability flags (`NM80211ApFlags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ApFlags: u32 {
        /// Access point requires some form of encryption.
        const PRIVACY = 0x0000_0001;
        /// Access point supports WPS.
        const WPS = 0x0000_0002;
    }
}

bitflags! {
    /// WPA/RSN security flags (`NM80211ApSecurityFlags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ApSecurityFlags: u32 {
        const PAIR_WEP40 = 0x0000_0001;
        const PAIR_WEP104 = 0x0000_0002;
        const PAIR_TKIP = 0x0000_0004;
        const PAIR_CCMP = 0x0000_0008;
        const GROUP_WEP40 = 0x0000_0010;
        const GROUP_WEP104 = 0x0000_0020;
        const GROUP_TKIP = 0x0000_0040;
        const GROUP_CCMP = 0x0000_0080;
        const KEY_MGMT_PSK = 0x0000_0100;
        const KEY_MGMT_802_1X = 0x0000_0200;
        const KEY_MGMT_SAE = 0x0000_0400;
    }
}

/// Security scheme advertised by a wireless network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Security {
    /// No encryption.
    Open,
    /// Legacy WEP.
    Wep,
    /// WPA (version 1).
    Wpa,
    /// WPA2 or newer (RSN).
    Wpa2,
    /// The backend could not classify the network.
    Unknown,
}

impl Security {
    /// Classifies an access point from its raw capability flags.
    ///
    /// Without the privacy flag the network is open. With it, RSN flags win
    /// over WPA flags, and a privacy-only access point is WEP.
    pub fn from_flags(flags: u32, wpa_flags: u32, rsn_flags: u32) -> Self {
        let flags = ApFlags::from_bits_truncate(flags);
        if !flags.contains(ApFlags::PRIVACY) {
            return Self::Open;
        }
        if !ApSecurityFlags::from_bits_retain(rsn_flags).is_empty() {
            Self::Wpa2
        } else if !ApSecurityFlags::from_bits_retain(wpa_flags).is_empty() {
            Self::Wpa
        } else {
            Self::Wep
        }
    }

    /// Classifies a network from an `nmcli` SECURITY column such as
    /// `"WPA1 WPA2"`, `"WEP"` or an empty string.
    pub fn from_nmcli(column: &str) -> Self {
        let column = column.trim();
        if column.is_empty() || column == "--" {
            return Self::Open;
        }
        if column.contains("WPA2") || column.contains("WPA3") {
            Self::Wpa2
        } else if column.contains("WPA") {
            Self::Wpa
        } else if column.contains("WEP") {
            Self::Wep
        } else {
            Self::Unknown
        }
    }

    /// Returns `true` when joining the network needs a credential.
    pub fn is_secured(self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl Display for Security {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Wep => write!(f, "WEP"),
            Self::Wpa => write!(f, "WPA"),
            Self::Wpa2 => write!(f, "WPA2"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// One visible wireless network, as shown in the network list.
///
/// Produced by a scan and superseded wholesale by the next one; entries are
/// never patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSummary {
    /// Network name. Never empty.
    pub ssid: String,
    /// Signal strength in percent, `None` when the backend did not report it.
    pub signal: Option<u8>,
    /// Advertised security scheme.
    pub security: Security,
    /// Whether this is the network the wireless device is associated with.
    pub is_active: bool,
}

impl NetworkSummary {
    /// Creates an inactive summary.
    pub fn new(ssid: impl Into<String>, signal: Option<u8>, security: Security) -> Self {
        Self {
            ssid: ssid.into(),
            signal,
            security,
            is_active: false,
        }
    }

    /// Marks the summary as the active network.
    #[must_use]
    pub fn active(mut self) -> Self {
        self.is_active = true;
        self
    }

    /// Formats the signal for display, `"unknown"` when missing.
    pub fn signal_label(&self) -> String {
        match self.signal {
            Some(s) => format!("{s}%"),
            None => "unknown".to_string(),
        }
    }
}

/// Addressing and hardware details of the device carrying the active network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveConnectionDetails {
    /// Interface name, e.g. `wlan0`.
    pub device: String,
    /// First IPv4 address without prefix, or `"Not connected"`.
    pub ipv4: String,
    /// First IPv6 address without prefix, or `"Not connected"`.
    pub ipv6: String,
    /// Hardware address, or `"Unknown"`.
    pub mac: String,
}

impl ActiveConnectionDetails {
    /// Builds details from optional backend values, filling placeholders.
    pub fn new(
        device: impl Into<String>,
        ipv4: Option<String>,
        ipv6: Option<String>,
        mac: Option<String>,
    ) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            device: device.into(),
            ipv4: non_empty(ipv4).unwrap_or_else(|| placeholders::NOT_CONNECTED.to_string()),
            ipv6: non_empty(ipv6).unwrap_or_else(|| placeholders::NOT_CONNECTED.to_string()),
            mac: non_empty(mac).unwrap_or_else(|| placeholders::UNKNOWN.to_string()),
        }
    }

    /// Details shown for a network that is not the active one.
    pub fn disconnected() -> Self {
        Self::new(String::new(), None, None, None)
    }

    /// Returns `true` when at least one address is known.
    pub fn has_address(&self) -> bool {
        self.ipv4 != placeholders::NOT_CONNECTED || self.ipv6 != placeholders::NOT_CONNECTED
    }
}

/// The active wireless association: which SSID, on which interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveLink {
    pub ssid: String,
    pub device: String,
}

/// Backend-specific handle to the access point chosen for a connection attempt.
///
/// Obtained from [`Backend::locate`](crate::Backend::locate) right before
/// connecting. The locator is opaque to the coordinator: a D-Bus object path
/// for the NetworkManager adapter, a BSSID for `nmcli`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPointRef {
    pub ssid: String,
    pub device: String,
    pub locator: String,
    pub security: Security,
}

/// NetworkManager active connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveConnectionState {
    Unknown,
    Activating,
    Activated,
    Deactivating,
    Deactivated,
    Other(u32),
}

impl From<u32> for ActiveConnectionState {
    fn from(code: u32) -> Self {
        match code {
            0 => Self::Unknown,
            1 => Self::Activating,
            2 => Self::Activated,
            3 => Self::Deactivating,
            4 => Self::Deactivated,
            v => Self::Other(v),
        }
    }
}

impl Display for ActiveConnectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Activating => write!(f, "activating"),
            Self::Activated => write!(f, "activated"),
            Self::Deactivating => write!(f, "deactivating"),
            Self::Deactivated => write!(f, "deactivated"),
            Self::Other(v) => write!(f, "unknown state ({v})"),
        }
    }
}

/// Reason codes attached to active connection state changes.
///
/// Only the codes the panel reacts to get their own variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStateReason {
    Unknown,
    UserDisconnected,
    DeviceDisconnected,
    ConnectTimeout,
    NoSecrets,
    LoginFailed,
    Other(u32),
}

impl From<u32> for ConnectionStateReason {
    fn from(code: u32) -> Self {
        match code {
            0 => Self::Unknown,
            2 => Self::UserDisconnected,
            3 => Self::DeviceDisconnected,
            6 => Self::ConnectTimeout,
            9 => Self::NoSecrets,
            10 => Self::LoginFailed,
            v => Self::Other(v),
        }
    }
}

impl Display for ConnectionStateReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::UserDisconnected => write!(f, "user disconnected"),
            Self::DeviceDisconnected => write!(f, "device disconnected"),
            Self::ConnectTimeout => write!(f, "connection timed out"),
            Self::NoSecrets => write!(f, "no secrets (password) provided"),
            Self::LoginFailed => write!(f, "login/authentication failed"),
            Self::Other(v) => write!(f, "reason code {v}"),
        }
    }
}

/// Converts an activation failure reason into the error surfaced to callers.
///
/// Credential problems become `AuthRejected`, everything else is an opaque
/// backend failure carrying the reason text.
pub fn connection_state_reason_to_error(code: u32) -> ConnectionError {
    match ConnectionStateReason::from(code) {
        ConnectionStateReason::NoSecrets | ConnectionStateReason::LoginFailed => {
            ConnectionError::AuthRejected
        }
        ConnectionStateReason::ConnectTimeout => ConnectionError::Timeout,
        reason => ConnectionError::Backend(format!("activation failed: {reason}")),
    }
}

/// Errors produced by backend adapters and the coordinator.
///
/// Transport faults never leave an adapter raw: they are folded into
/// [`ConnectionError::Backend`] with the transport's message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// No wireless adapter exists on the system.
    #[error("no Wi-Fi device found")]
    NoWifiDevice,

    /// The target network vanished between listing and connecting.
    #[error("network '{0}' not found")]
    NotFound(String),

    /// The credential was missing or rejected.
    #[error("authentication rejected")]
    AuthRejected,

    /// A disconnect was requested for a network that is not active.
    #[error("network '{0}' is not connected")]
    NotConnected(String),

    /// Opaque transport or service failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// A backend call exceeded the configured bound.
    #[error("backend call timed out")]
    Timeout,

    /// Another connect/disconnect attempt is in flight.
    #[error("a connection attempt is already in progress")]
    Busy,

    /// The user dismissed the password prompt.
    #[error("password prompt cancelled")]
    PromptCancelled,

    /// Nobody answered the password prompt in time.
    #[error("password prompt timed out")]
    PromptTimedOut,

    /// A second prompt was requested for an attempt that already has one.
    #[error("a password prompt is already pending for this attempt")]
    PromptAlreadyPending,

    /// The worker failed unexpectedly; the message is the panic payload.
    #[error("operation aborted: {0}")]
    Aborted(String),

    /// The coordinator could not obtain its async runtime.
    #[error("runtime unavailable: {0}")]
    Runtime(String),
}

impl ConnectionError {
    /// Returns `true` for prompt cancellation or timeout, which abandon an
    /// attempt without being reported as a user-facing failure.
    pub fn is_abandonment(&self) -> bool {
        matches!(self, Self::PromptCancelled | Self::PromptTimedOut)
    }
}

impl From<zbus::Error> for ConnectionError {
    fn from(e: zbus::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

impl From<zbus::fdo::Error> for ConnectionError {
    fn from(e: zbus::fdo::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

impl From<zvariant::Error> for ConnectionError {
    fn from(e: zvariant::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

impl From<std::io::Error> for ConnectionError {
    fn from(e: std::io::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_without_privacy_is_open() {
        assert_eq!(Security::from_flags(0, 0x188, 0x188), Security::Open);
    }

    #[test]
    fn security_prefers_rsn_over_wpa() {
        let psk_ccmp = (ApSecurityFlags::KEY_MGMT_PSK | ApSecurityFlags::PAIR_CCMP).bits();
        assert_eq!(Security::from_flags(1, psk_ccmp, psk_ccmp), Security::Wpa2);
        assert_eq!(Security::from_flags(1, psk_ccmp, 0), Security::Wpa);
        assert_eq!(Security::from_flags(1, 0, 0), Security::Wep);
    }

    #[test]
    fn security_from_nmcli_column() {
        assert_eq!(Security::from_nmcli(""), Security::Open);
        assert_eq!(Security::from_nmcli("--"), Security::Open);
        assert_eq!(Security::from_nmcli("WPA1 WPA2"), Security::Wpa2);
        assert_eq!(Security::from_nmcli("WPA3"), Security::Wpa2);
        assert_eq!(Security::from_nmcli("WPA1"), Security::Wpa);
        assert_eq!(Security::from_nmcli("WEP"), Security::Wep);
        assert_eq!(Security::from_nmcli("802.1X"), Security::Unknown);
    }

    #[test]
    fn security_display() {
        assert_eq!(Security::Wpa2.to_string(), "WPA2");
        assert_eq!(Security::Open.to_string(), "Open");
        assert!(!Security::Open.is_secured());
        assert!(Security::Unknown.is_secured());
    }

    #[test]
    fn details_fill_placeholders() {
        let d =
            ActiveConnectionDetails::new("wlan0", Some("10.0.0.2".into()), None, Some(" ".into()));
        assert_eq!(d.ipv4, "10.0.0.2");
        assert_eq!(d.ipv6, "Not connected");
        assert_eq!(d.mac, "Unknown");
        assert!(d.has_address());
        assert!(!ActiveConnectionDetails::disconnected().has_address());
    }

    #[test]
    fn signal_label_handles_unknown() {
        assert_eq!(NetworkSummary::new("a", Some(42), Security::Open).signal_label(), "42%");
        assert_eq!(NetworkSummary::new("a", None, Security::Open).signal_label(), "unknown");
    }

    #[test]
    fn reason_codes_map_to_errors() {
        assert_eq!(connection_state_reason_to_error(9), ConnectionError::AuthRejected);
        assert_eq!(connection_state_reason_to_error(10), ConnectionError::AuthRejected);
        assert_eq!(connection_state_reason_to_error(6), ConnectionError::Timeout);
        assert!(matches!(
            connection_state_reason_to_error(42),
            ConnectionError::Backend(_)
        ));
    }

    #[test]
    fn active_connection_state_from_u32() {
        assert_eq!(ActiveConnectionState::from(2), ActiveConnectionState::Activated);
        assert_eq!(ActiveConnectionState::from(4), ActiveConnectionState::Deactivated);
        assert_eq!(ActiveConnectionState::from(77), ActiveConnectionState::Other(77));
    }

    #[test]
    fn abandonment_errors() {
        assert!(ConnectionError::PromptCancelled.is_abandonment());
        assert!(ConnectionError::PromptTimedOut.is_abandonment());
        assert!(!ConnectionError::AuthRejected.is_abandonment());
    }
}
