//! Panel configuration loaded from `$XDG_CONFIG_HOME/netpanel/config.toml`.
//!
//! Every field has a default, so a missing, unreadable or malformed file
//! simply yields the defaults.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::BackendKind;
use crate::types::constants::timeouts;

/// Shortest refresh period accepted; smaller values are raised to it.
const MIN_REFRESH_SECS: u64 = 1;

/// Coordinator and backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Adapter to open at startup (default: "auto")
    pub backend: BackendKind,

    /// Seconds between periodic refreshes (default: 5)
    pub refresh_interval_secs: u64,

    /// Seconds to wait for a password prompt answer (default: 300)
    pub prompt_timeout_secs: u64,

    /// Upper bound on a single backend call in seconds, 0 disables (default: 90)
    pub operation_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            refresh_interval_secs: timeouts::DEFAULT_REFRESH_SECS,
            prompt_timeout_secs: timeouts::DEFAULT_PROMPT_SECS,
            operation_timeout_secs: timeouts::DEFAULT_OPERATION_SECS,
        }
    }
}

impl Settings {
    /// Loads settings from the default location.
    pub fn load() -> Self {
        match config_file_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Loads settings from `path`, falling back to defaults on any error.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            info!("No config file found, using defaults");
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Settings>(&contents) {
                Ok(settings) => {
                    info!("Config loaded from {path:?}");
                    settings
                }
                Err(e) => {
                    warn!("Failed to parse config file: {e}, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read config file: {e}, using defaults");
                Self::default()
            }
        }
    }

    /// Period of the refresh scheduler.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(MIN_REFRESH_SECS))
    }

    /// How long a worker waits for the user to answer a password prompt.
    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_secs(self.prompt_timeout_secs)
    }

    /// Bound on one backend call, `None` when disabled.
    pub fn operation_timeout(&self) -> Option<Duration> {
        (self.operation_timeout_secs > 0).then(|| Duration::from_secs(self.operation_timeout_secs))
    }
}

/// Returns `$XDG_CONFIG_HOME/netpanel/config.toml`.
pub fn config_file_path() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("netpanel").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.backend, BackendKind::Auto);
        assert_eq!(s.refresh_interval(), Duration::from_secs(5));
        assert_eq!(s.prompt_timeout(), Duration::from_secs(300));
        assert_eq!(s.operation_timeout(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let s: Settings =
            toml::from_str("backend = \"nmcli\"\nrefresh_interval_secs = 10\n").unwrap();
        assert_eq!(s.backend, BackendKind::Nmcli);
        assert_eq!(s.refresh_interval_secs, 10);
        assert_eq!(s.prompt_timeout_secs, 300);
    }

    #[test]
    fn zero_disables_operation_timeout_and_interval_is_clamped() {
        let s: Settings =
            toml::from_str("operation_timeout_secs = 0\nrefresh_interval_secs = 0\n").unwrap();
        assert_eq!(s.operation_timeout(), None);
        assert_eq!(s.refresh_interval(), Duration::from_secs(1));
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!("netpanel-test-{}.toml", std::process::id()));
        std::fs::write(&path, "backend = [").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
        std::fs::remove_file(&path).unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }
}
