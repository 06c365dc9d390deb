//! D-Bus proxy interfaces for NetworkManager.
//!
//! Low-level proxy definitions used by the NetworkManager adapter. Only the
//! subset of the NetworkManager API the panel needs is declared here.

mod access_point;
mod active_connection;
mod device;
mod ip_config;
mod main_nm;
mod settings;
mod wireless;

pub(crate) use access_point::NMAccessPointProxy;
pub(crate) use active_connection::NMActiveConnectionProxy;
pub(crate) use device::NMDeviceProxy;
pub(crate) use ip_config::NMIpConfigProxy;
pub(crate) use main_nm::NMProxy;
pub(crate) use settings::{NMSettingsConnectionProxy, NMSettingsProxy, SettingsMap};
pub(crate) use wireless::NMWirelessProxy;
