//! NetworkManager logic behind the D-Bus adapter.
//!
//! Device lookup, scanning, saved profiles, connect/disconnect flows and the
//! signal-based state waits they rely on.

pub(crate) mod connection;
pub(crate) mod connection_settings;
pub(crate) mod device;
pub(crate) mod scan;
pub(crate) mod state_wait;
