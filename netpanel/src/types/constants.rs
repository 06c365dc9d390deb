//! Constants for NetworkManager D-Bus interface values.
//!
//! These constants correspond to the numeric codes used by NetworkManager's
//! D-Bus API for device types, states and connection settings, plus the
//! default timings used by the coordinator.

/// NetworkManager device type constants.
pub mod device_type {
    pub const WIFI: u32 = 2;
}

/// NetworkManager device state constants
pub mod device_state {
    pub const UNAVAILABLE: u32 = 20;
    pub const DISCONNECTED: u32 = 30;
}

/// Object paths with special meaning.
pub mod paths {
    /// Placeholder NetworkManager returns for "no object".
    pub const NONE: &str = "/";
}

/// Connection setting names as used in NetworkManager settings maps.
pub mod settings {
    pub const CONNECTION: &str = "connection";
    pub const WIRELESS: &str = "802-11-wireless";
    pub const WIRELESS_SECURITY: &str = "802-11-wireless-security";
    pub const INFRASTRUCTURE: &str = "infrastructure";
    pub const KEY_MGMT_PSK: &str = "wpa-psk";
}

/// Placeholder texts for values a device cannot report.
pub mod placeholders {
    pub const NOT_CONNECTED: &str = "Not connected";
    pub const UNKNOWN: &str = "Unknown";
}

/// Timeout constants for backend calls and the coordinator.
pub mod timeouts {
    use std::time::Duration;

    /// Time to wait after requesting a scan before reading results (2 seconds).
    const SCAN_WAIT_SECS: u64 = 2;

    /// Maximum time to wait for an activated connection (30 seconds).
    const ACTIVATION_TIMEOUT_SECS: u64 = 30;

    /// Maximum time to wait for a device to disconnect (10 seconds).
    const DISCONNECT_TIMEOUT_SECS: u64 = 10;

    /// Settle time after a disconnect (100 milliseconds).
    const STABILIZATION_DELAY_MS: u64 = 100;

    /// Default period of the refresh scheduler.
    pub const DEFAULT_REFRESH_SECS: u64 = 5;

    /// Default bound on the password prompt wait (five minutes).
    pub const DEFAULT_PROMPT_SECS: u64 = 300;

    /// Default bound on a single backend call.
    pub const DEFAULT_OPERATION_SECS: u64 = 90;

    /// Returns the scan wait duration.
    pub fn scan_wait() -> Duration {
        Duration::from_secs(SCAN_WAIT_SECS)
    }

    /// Returns the activation timeout.
    pub fn activation_timeout() -> Duration {
        Duration::from_secs(ACTIVATION_TIMEOUT_SECS)
    }

    /// Returns the disconnect timeout.
    pub fn disconnect_timeout() -> Duration {
        Duration::from_secs(DISCONNECT_TIMEOUT_SECS)
    }

    /// Returns the post-disconnect settle time.
    pub fn stabilization_delay() -> Duration {
        Duration::from_millis(STABILIZATION_DELAY_MS)
    }
}
