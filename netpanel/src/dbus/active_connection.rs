//! NetworkManager Active Connection proxy.

use zbus::{proxy, Result};
use zvariant::OwnedObjectPath;

/// Proxy for active connection interface.
///
/// An active connection links a saved profile to a device. The
/// `StateChanged` signal reports activation progress together with a
/// reason code, which is how authentication failures are detected.
#[proxy(
    interface = "org.freedesktop.NetworkManager.Connection.Active",
    default_service = "org.freedesktop.NetworkManager"
)]
pub trait NMActiveConnection {
    /// Current state (1 activating, 2 activated, 3 deactivating, 4 deactivated).
    #[zbus(property)]
    fn state(&self) -> Result<u32>;

    /// Connection type, e.g. "802-11-wireless".
    #[zbus(property, name = "Type")]
    fn connection_type(&self) -> Result<String>;

    /// Paths to devices using this connection.
    #[zbus(property)]
    fn devices(&self) -> Result<Vec<OwnedObjectPath>>;

    /// Emitted when the activation state changes.
    #[zbus(signal, name = "StateChanged")]
    fn activation_state_changed(&self, state: u32, reason: u32);
}
