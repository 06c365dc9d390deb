//! Backend adapters.
//!
//! [`Backend`] is the uniform surface the coordinator talks to. Three
//! implementations exist: NetworkManager over D-Bus, the `nmcli` command
//! line tool, and an in-memory mock.
//!
//! Every method may block for as long as the underlying service takes and is
//! only ever called from worker tasks. Implementations hold no mutable state
//! across calls beyond their connection handle, so concurrent calls from
//! independent workers are fine.

pub mod mock;
pub mod networkmanager;
pub mod nmcli;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use crate::Result;
use crate::api::models::{
    AccessPointRef, ActiveConnectionDetails, ActiveLink, ConnectionError, NetworkSummary,
};

pub use mock::MockBackend;
pub use networkmanager::NetworkManagerBackend;
pub use nmcli::NmcliBackend;

/// Operations the coordinator needs from a network-management service.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Rescans and returns the visible networks, deduplicated by SSID.
    ///
    /// Returns an empty list when there is no wireless device. A failure on
    /// one device does not fail the call.
    async fn list_networks(&self) -> Result<Vec<NetworkSummary>>;

    /// Returns the first active wireless association, if any.
    async fn active_link(&self) -> Result<Option<ActiveLink>>;

    /// Returns the SSID of the first active wireless connection.
    async fn active_network(&self) -> Result<Option<String>> {
        Ok(self.active_link().await?.map(|link| link.ssid))
    }

    /// Resolves the access point to use for connecting to `ssid`.
    ///
    /// Fails with [`ConnectionError::NotFound`] when the network vanished.
    async fn locate(&self, ssid: &str) -> Result<AccessPointRef>;

    /// Returns `true` when joining `ap` needs a credential the backend does
    /// not already hold.
    async fn requires_secret(&self, ap: &AccessPointRef) -> Result<bool>;

    /// Joins the network. The adapter never prompts; a missing credential on
    /// a secured network fails with [`ConnectionError::AuthRejected`].
    async fn connect(&self, ssid: &str, ap: &AccessPointRef, password: Option<&str>)
    -> Result<()>;

    /// Leaves the network, failing with [`ConnectionError::NotConnected`]
    /// when `ssid` is not active.
    async fn disconnect(&self, ssid: &str) -> Result<()>;

    /// Reads addressing and hardware details of `device`.
    async fn device_details(&self, device: &str) -> Result<ActiveConnectionDetails>;

    /// Returns the stored credential for `ssid`, if the backend has one.
    async fn stored_secret(&self, ssid: &str) -> Result<Option<String>>;
}

/// Which adapter to open at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// NetworkManager over D-Bus, falling back to `nmcli` when the bus is
    /// unavailable.
    #[default]
    Auto,
    #[serde(alias = "nm")]
    NetworkManager,
    Nmcli,
    Mock,
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::NetworkManager => write!(f, "networkmanager"),
            Self::Nmcli => write!(f, "nmcli"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = ConnectionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "networkmanager" | "nm" => Ok(Self::NetworkManager),
            "nmcli" => Ok(Self::Nmcli),
            "mock" => Ok(Self::Mock),
            other => Err(ConnectionError::Backend(format!(
                "unknown backend '{other}'"
            ))),
        }
    }
}

/// Opens the adapter selected by `kind`.
///
/// The choice is made once; the returned adapter lives as long as the
/// coordinator that owns it.
pub async fn open(kind: BackendKind) -> Result<Arc<dyn Backend>> {
    match kind {
        BackendKind::NetworkManager => Ok(Arc::new(NetworkManagerBackend::new().await?)),
        BackendKind::Nmcli => Ok(Arc::new(NmcliBackend::new())),
        BackendKind::Mock => Ok(Arc::new(MockBackend::with_sample_networks())),
        BackendKind::Auto => match NetworkManagerBackend::new().await {
            Ok(nm) => {
                debug!("Using NetworkManager D-Bus backend");
                Ok(Arc::new(nm))
            }
            Err(e) => {
                warn!("NetworkManager D-Bus unavailable: {e}");
                if nmcli::is_available() {
                    info!("Falling back to nmcli backend");
                    Ok(Arc::new(NmcliBackend::new()))
                } else {
                    Err(ConnectionError::Backend(format!(
                        "no usable backend: {e}; nmcli not found on PATH"
                    )))
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_parses_aliases() {
        assert_eq!("auto".parse::<BackendKind>().unwrap(), BackendKind::Auto);
        assert_eq!("NM".parse::<BackendKind>().unwrap(), BackendKind::NetworkManager);
        assert_eq!(
            "networkmanager".parse::<BackendKind>().unwrap(),
            BackendKind::NetworkManager
        );
        assert_eq!("nmcli".parse::<BackendKind>().unwrap(), BackendKind::Nmcli);
        assert_eq!(" mock ".parse::<BackendKind>().unwrap(), BackendKind::Mock);
        assert!("wicd".parse::<BackendKind>().is_err());
    }

    #[test]
    fn backend_kind_display_round_trips() {
        for kind in [
            BackendKind::Auto,
            BackendKind::NetworkManager,
            BackendKind::Nmcli,
            BackendKind::Mock,
        ] {
            assert_eq!(kind.to_string().parse::<BackendKind>().unwrap(), kind);
        }
    }

    #[tokio::test]
    async fn open_mock_backend() {
        let backend = open(BackendKind::Mock).await.unwrap();
        assert_eq!(backend.name(), "mock");
        assert!(!backend.list_networks().await.unwrap().is_empty());
    }
}
