//! NetworkManager adapter over the D-Bus system bus.

use async_trait::async_trait;
use log::debug;
use zbus::Connection;

use super::Backend;
use crate::Result;
use crate::api::models::{AccessPointRef, ActiveConnectionDetails, ActiveLink, NetworkSummary};
use crate::core::{connection, connection_settings, device, scan};
use crate::dbus::NMProxy;

/// Adapter holding one system bus connection.
///
/// The connection is created once at startup and shared by every worker;
/// zbus connections are cheap to clone and safe to use concurrently.
#[derive(Debug, Clone)]
pub struct NetworkManagerBackend {
    conn: Connection,
}

impl NetworkManagerBackend {
    /// Connects to the system bus and checks that NetworkManager answers.
    pub async fn new() -> Result<Self> {
        let conn = Connection::system().await?;
        let nm = NMProxy::new(&conn).await?;
        // Fails fast when the service is not running.
        nm.get_devices().await?;
        debug!("Connected to NetworkManager");
        Ok(Self { conn })
    }

    /// Wraps an existing bus connection.
    pub fn with_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Backend for NetworkManagerBackend {
    fn name(&self) -> &'static str {
        "networkmanager"
    }

    async fn list_networks(&self) -> Result<Vec<NetworkSummary>> {
        scan::list_networks(&self.conn).await
    }

    async fn active_link(&self) -> Result<Option<ActiveLink>> {
        scan::active_link(&self.conn).await
    }

    async fn locate(&self, ssid: &str) -> Result<AccessPointRef> {
        scan::locate(&self.conn, ssid).await
    }

    async fn requires_secret(&self, ap: &AccessPointRef) -> Result<bool> {
        if !ap.security.is_secured() {
            return Ok(false);
        }
        let saved = connection_settings::has_saved_connection(&self.conn, &ap.ssid).await?;
        Ok(!saved)
    }

    async fn connect(
        &self,
        ssid: &str,
        ap: &AccessPointRef,
        password: Option<&str>,
    ) -> Result<()> {
        connection::connect(&self.conn, ssid, ap, password).await
    }

    async fn disconnect(&self, ssid: &str) -> Result<()> {
        connection::disconnect(&self.conn, ssid).await
    }

    async fn device_details(&self, device: &str) -> Result<ActiveConnectionDetails> {
        device::device_details(&self.conn, device).await
    }

    async fn stored_secret(&self, ssid: &str) -> Result<Option<String>> {
        connection_settings::stored_psk(&self.conn, ssid).await
    }
}
