//! In-memory backend for tests and demos.
//!
//! Holds a fixed set of networks, an optional active association and the
//! secrets of "saved" networks. Recent calls are recorded so tests can assert
//! on what the coordinator asked for. Failures, panics and delays can be
//! scripted per operation.

use async_trait::async_trait;
use log::debug;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::Backend;
use crate::Result;
use crate::api::models::{
    AccessPointRef, ActiveConnectionDetails, ActiveLink, ConnectionError, NetworkSummary, Security,
};

const MOCK_DEVICE: &str = "wlan0";

/// Oldest calls are dropped beyond this many.
const CALL_LOG_LIMIT: usize = 512;

/// Backend operations, used to script behaviour and to read the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    ListNetworks,
    ActiveLink,
    Locate,
    RequiresSecret,
    Connect,
    Disconnect,
    DeviceDetails,
    StoredSecret,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    ListNetworks,
    ActiveLink,
    Locate(String),
    RequiresSecret(String),
    Connect {
        ssid: String,
        password: Option<String>,
    },
    Disconnect(String),
    DeviceDetails(String),
    StoredSecret(String),
}

#[derive(Debug, Default)]
struct MockState {
    networks: Vec<NetworkSummary>,
    active: Option<String>,
    saved: HashMap<String, String>,
    accepted: HashMap<String, String>,
    failures: HashMap<MockOp, ConnectionError>,
    panics: HashSet<MockOp>,
    delays: HashMap<MockOp, Duration>,
    calls: VecDeque<MockCall>,
}

/// Scriptable in-memory [`Backend`].
#[derive(Debug, Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    /// Creates a backend with no networks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend with a handful of networks, "Home_Fiber_5G" active.
    pub fn with_sample_networks() -> Self {
        Self::new()
            .with_network("Home_Fiber_5G", Some(92), Security::Wpa2)
            .with_network("Office_Main", Some(71), Security::Wpa2)
            .with_network("Coffee_Shop_Free", Some(64), Security::Open)
            .with_network("Guest_Network", Some(48), Security::Wpa)
            .with_network("Linksys_502", None, Security::Wep)
            .with_saved_secret("Home_Fiber_5G", "correct horse battery")
            .with_active("Home_Fiber_5G")
    }

    /// Adds a visible network.
    pub fn with_network(self, ssid: &str, signal: Option<u8>, security: Security) -> Self {
        self.lock()
            .networks
            .push(NetworkSummary::new(ssid, signal, security));
        self
    }

    /// Marks `ssid` as the active association.
    pub fn with_active(self, ssid: &str) -> Self {
        self.lock().active = Some(ssid.to_string());
        self
    }

    /// Stores a secret for `ssid`, as if it had a saved profile.
    pub fn with_saved_secret(self, ssid: &str, secret: &str) -> Self {
        self.lock().saved.insert(ssid.to_string(), secret.to_string());
        self
    }

    /// Only `password` will be accepted when connecting to `ssid`.
    pub fn with_password(self, ssid: &str, password: &str) -> Self {
        self.lock()
            .accepted
            .insert(ssid.to_string(), password.to_string());
        self
    }

    /// Makes every call of `op` fail with `err`.
    pub fn fail(&self, op: MockOp, err: ConnectionError) {
        self.lock().failures.insert(op, err);
    }

    /// Makes every call of `op` panic.
    pub fn panic_on(&self, op: MockOp) {
        self.lock().panics.insert(op);
    }

    /// Delays every call of `op`.
    pub fn delay(&self, op: MockOp, by: Duration) {
        self.lock().delays.insert(op, by);
    }

    /// Clears scripted failures, panics and delays.
    pub fn reset_script(&self) {
        let mut state = self.lock();
        state.failures.clear();
        state.panics.clear();
        state.delays.clear();
    }

    /// Replaces the visible networks.
    pub fn set_networks(&self, networks: Vec<NetworkSummary>) {
        self.lock().networks = networks;
    }

    /// Returns the most recent calls, oldest first.
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.iter().cloned().collect()
    }

    /// Returns the currently active SSID.
    pub fn active(&self) -> Option<String> {
        self.lock().active.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking scripted call must not wedge later calls.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records the call and applies the script for `op`.
    async fn enter(&self, op: MockOp, call: MockCall) -> Result<()> {
        let (delay, panics, failure) = {
            let mut state = self.lock();
            if state.calls.len() == CALL_LOG_LIMIT {
                state.calls.pop_front();
            }
            state.calls.push_back(call);
            (
                state.delays.get(&op).copied(),
                state.panics.contains(&op),
                state.failures.get(&op).cloned(),
            )
        };

        if let Some(by) = delay {
            tokio::time::sleep(by).await;
        }
        if panics {
            panic!("scripted panic in {op:?}");
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn list_networks(&self) -> Result<Vec<NetworkSummary>> {
        match self.enter(MockOp::ListNetworks, MockCall::ListNetworks).await {
            Ok(()) => {}
            Err(ConnectionError::NoWifiDevice) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        }
        Ok(self.lock().networks.clone())
    }

    async fn active_link(&self) -> Result<Option<ActiveLink>> {
        self.enter(MockOp::ActiveLink, MockCall::ActiveLink).await?;
        Ok(self.lock().active.clone().map(|ssid| ActiveLink {
            ssid,
            device: MOCK_DEVICE.to_string(),
        }))
    }

    async fn locate(&self, ssid: &str) -> Result<AccessPointRef> {
        self.enter(MockOp::Locate, MockCall::Locate(ssid.to_string()))
            .await?;
        let state = self.lock();
        let (index, net) = state
            .networks
            .iter()
            .enumerate()
            .find(|(_, n)| n.ssid == ssid)
            .ok_or_else(|| ConnectionError::NotFound(ssid.to_string()))?;
        Ok(AccessPointRef {
            ssid: net.ssid.clone(),
            device: MOCK_DEVICE.to_string(),
            locator: format!("mock-ap-{index}"),
            security: net.security,
        })
    }

    async fn requires_secret(&self, ap: &AccessPointRef) -> Result<bool> {
        self.enter(MockOp::RequiresSecret, MockCall::RequiresSecret(ap.ssid.clone()))
            .await?;
        Ok(ap.security.is_secured() && !self.lock().saved.contains_key(&ap.ssid))
    }

    async fn connect(
        &self,
        ssid: &str,
        ap: &AccessPointRef,
        password: Option<&str>,
    ) -> Result<()> {
        self.enter(
            MockOp::Connect,
            MockCall::Connect {
                ssid: ssid.to_string(),
                password: password.map(str::to_string),
            },
        )
        .await?;

        let mut state = self.lock();
        if ap.security.is_secured() {
            let secret = match password {
                Some(pw) => pw.to_string(),
                None => state
                    .saved
                    .get(ssid)
                    .cloned()
                    .ok_or(ConnectionError::AuthRejected)?,
            };
            if let Some(expected) = state.accepted.get(ssid) {
                if *expected != secret {
                    debug!("Mock rejected password for '{ssid}'");
                    return Err(ConnectionError::AuthRejected);
                }
            }
            state.saved.insert(ssid.to_string(), secret);
        }
        state.active = Some(ssid.to_string());
        Ok(())
    }

    async fn disconnect(&self, ssid: &str) -> Result<()> {
        self.enter(MockOp::Disconnect, MockCall::Disconnect(ssid.to_string()))
            .await?;
        let mut state = self.lock();
        if state.active.as_deref() != Some(ssid) {
            return Err(ConnectionError::NotConnected(ssid.to_string()));
        }
        state.active = None;
        Ok(())
    }

    async fn device_details(&self, device: &str) -> Result<ActiveConnectionDetails> {
        self.enter(MockOp::DeviceDetails, MockCall::DeviceDetails(device.to_string()))
            .await?;
        if self.lock().active.is_none() {
            return Ok(ActiveConnectionDetails::new(
                device,
                None,
                None,
                Some("02:00:00:00:00:01".into()),
            ));
        }
        Ok(ActiveConnectionDetails::new(
            device,
            Some("192.168.1.42".into()),
            Some("fe80::1".into()),
            Some("02:00:00:00:00:01".into()),
        ))
    }

    async fn stored_secret(&self, ssid: &str) -> Result<Option<String>> {
        self.enter(MockOp::StoredSecret, MockCall::StoredSecret(ssid.to_string()))
            .await?;
        Ok(self.lock().saved.get(ssid).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_requires_known_secret() {
        let mock = MockBackend::new().with_network("Secure-AP", Some(60), Security::Wpa2);
        let ap = mock.locate("Secure-AP").await.unwrap();
        assert!(mock.requires_secret(&ap).await.unwrap());
        assert_eq!(
            mock.connect("Secure-AP", &ap, None).await,
            Err(ConnectionError::AuthRejected)
        );
        mock.connect("Secure-AP", &ap, Some("hunter2")).await.unwrap();
        assert_eq!(mock.active().as_deref(), Some("Secure-AP"));
        assert!(!mock.requires_secret(&ap).await.unwrap());
        assert_eq!(
            mock.stored_secret("Secure-AP").await.unwrap().as_deref(),
            Some("hunter2")
        );
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let mock = MockBackend::new()
            .with_network("Secure-AP", Some(60), Security::Wpa2)
            .with_password("Secure-AP", "hunter2");
        let ap = mock.locate("Secure-AP").await.unwrap();
        assert_eq!(
            mock.connect("Secure-AP", &ap, Some("hunter3")).await,
            Err(ConnectionError::AuthRejected)
        );
        assert_eq!(mock.active(), None);
    }

    #[tokio::test]
    async fn disconnect_inactive_network() {
        let mock = MockBackend::with_sample_networks();
        assert_eq!(
            mock.disconnect("Ghost").await,
            Err(ConnectionError::NotConnected("Ghost".into()))
        );
        mock.disconnect("Home_Fiber_5G").await.unwrap();
        assert_eq!(mock.active_network().await.unwrap(), None);
    }

    #[tokio::test]
    async fn locate_missing_network() {
        let mock = MockBackend::new();
        assert_eq!(
            mock.locate("Ghost").await.unwrap_err(),
            ConnectionError::NotFound("Ghost".into())
        );
    }

    #[tokio::test]
    async fn scripted_failures_and_call_log() {
        let mock = MockBackend::with_sample_networks();
        mock.fail(MockOp::ListNetworks, ConnectionError::Backend("down".into()));
        assert!(mock.list_networks().await.is_err());
        mock.fail(MockOp::ListNetworks, ConnectionError::NoWifiDevice);
        assert!(mock.list_networks().await.unwrap().is_empty());
        mock.reset_script();
        assert_eq!(mock.list_networks().await.unwrap().len(), 5);
        assert_eq!(mock.calls().len(), 3);
        assert!(mock.calls().iter().all(|c| *c == MockCall::ListNetworks));
    }

    #[tokio::test]
    async fn call_log_keeps_only_recent_calls() {
        let mock = MockBackend::new().with_network("Cafe", Some(40), Security::Open);
        for _ in 0..CALL_LOG_LIMIT {
            mock.list_networks().await.unwrap();
        }
        mock.stored_secret("Cafe").await.unwrap();

        let calls = mock.calls();
        assert_eq!(calls.len(), CALL_LOG_LIMIT);
        assert_eq!(calls.last(), Some(&MockCall::StoredSecret("Cafe".into())));
        assert_eq!(
            calls.iter().filter(|c| **c == MockCall::ListNetworks).count(),
            CALL_LOG_LIMIT - 1
        );
    }
}
