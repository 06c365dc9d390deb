//! Signal-driven waits for activation and disconnect.
//!
//! Each wait subscribes to the relevant `StateChanged` signal first, checks
//! the current state, then races the signal stream against a deadline.

use futures::{FutureExt, StreamExt, select};
use futures_timer::Delay;
use log::{debug, warn};
use std::pin::pin;
use zbus::Connection;
use zvariant::OwnedObjectPath;

use crate::Result;
use crate::api::models::{
    ActiveConnectionState, ConnectionError, ConnectionStateReason, connection_state_reason_to_error,
};
use crate::dbus::{NMActiveConnectionProxy, NMDeviceProxy};
use crate::types::constants::{device_state, timeouts};

fn device_settled(state: u32) -> bool {
    matches!(state, device_state::DISCONNECTED | device_state::UNAVAILABLE)
}

fn stream_closed() -> ConnectionError {
    ConnectionError::Backend("NetworkManager closed the signal stream".into())
}

/// `Some` once an activation has reached a final state.
fn activation_verdict(state: ActiveConnectionState, reason: u32) -> Option<Result<()>> {
    match state {
        ActiveConnectionState::Activated => Some(Ok(())),
        ActiveConnectionState::Deactivated => Some(Err(connection_state_reason_to_error(reason))),
        _ => None,
    }
}

/// Waits until the active connection at `path` is activated.
///
/// A deactivation is mapped through its reason code, so missing or rejected
/// secrets come back as [`ConnectionError::AuthRejected`].
pub(crate) async fn wait_for_connection_activation(
    conn: &Connection,
    path: &OwnedObjectPath,
) -> Result<()> {
    let active = NMActiveConnectionProxy::builder(conn)
        .path(path.clone())?
        .build()
        .await?;
    let mut changes = active.receive_activation_state_changed().await?;

    let initial = ActiveConnectionState::from(active.state().await?);
    debug!("Activation of {path} starts in state {initial}");
    if initial == ActiveConnectionState::Deactivated {
        return Err(ConnectionError::Backend(
            "connection deactivated before activation".into(),
        ));
    }
    if let Some(verdict) = activation_verdict(initial, 0) {
        return verdict;
    }

    let limit = timeouts::activation_timeout();
    let mut deadline = pin!(Delay::new(limit).fuse());

    loop {
        select! {
            _ = deadline => {
                warn!("Activation of {path} not finished after {limit:?}");
                return Err(ConnectionError::Timeout);
            }
            next = changes.next() => {
                let signal = next.ok_or_else(stream_closed)?;
                let Ok(args) = signal.args() else {
                    warn!("Ignoring malformed activation StateChanged signal");
                    continue;
                };
                let state = ActiveConnectionState::from(args.state);
                debug!(
                    "Activation of {path}: {state} ({})",
                    ConnectionStateReason::from(args.reason)
                );
                if let Some(verdict) = activation_verdict(state, args.reason) {
                    return verdict;
                }
            }
        }
    }
}

/// Waits until `device` is disconnected or unavailable.
pub(crate) async fn wait_for_device_disconnect(device: &NMDeviceProxy<'_>) -> Result<()> {
    let mut changes = device.receive_device_state_changed().await?;
    if device_settled(device.state().await?) {
        return Ok(());
    }

    let mut deadline = pin!(Delay::new(timeouts::disconnect_timeout()).fuse());

    loop {
        select! {
            _ = deadline => {
                // A transition may have landed just before the deadline.
                let state = device.state().await?;
                if device_settled(state) {
                    return Ok(());
                }
                warn!("Device still in state {state} after disconnect deadline");
                return Err(ConnectionError::Timeout);
            }
            next = changes.next() => {
                let signal = next.ok_or_else(stream_closed)?;
                match signal.args() {
                    Ok(args) if device_settled(args.new_state) => return Ok(()),
                    Ok(args) => debug!("Device state {} while disconnecting", args.new_state),
                    Err(e) => warn!("Ignoring malformed device StateChanged signal: {e}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settled_states() {
        assert!(device_settled(device_state::DISCONNECTED));
        assert!(device_settled(device_state::UNAVAILABLE));
        assert!(!device_settled(100));
    }

    #[test]
    fn verdicts() {
        assert_eq!(
            activation_verdict(ActiveConnectionState::Activated, 0),
            Some(Ok(()))
        );
        assert_eq!(
            activation_verdict(ActiveConnectionState::Deactivated, 9),
            Some(Err(ConnectionError::AuthRejected))
        );
        assert_eq!(activation_verdict(ActiveConnectionState::Activating, 0), None);
    }
}
