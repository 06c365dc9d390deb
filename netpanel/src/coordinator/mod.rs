//! The asynchronous network-operation coordinator.
//!
//! Backend calls run on worker tasks. Their results, prompt requests and
//! guard transitions come back over one channel that only the
//! [`Coordinator`] reads, on whatever loop owns the user interface. All
//! presentation state lives in the coordinator and is only touched there.
//!
//! ```no_run
//! use std::sync::Arc;
//! use netpanel::{Coordinator, MockBackend, Settings, UiEvent};
//!
//! # async fn example() -> netpanel::Result<()> {
//! let backend = Arc::new(MockBackend::with_sample_networks());
//! let mut panel = Coordinator::new(backend, &Settings::default())?;
//! panel.subscribe(|event| {
//!     if let UiEvent::NetworksUpdated { networks, .. } = event {
//!         println!("{} networks", networks.len());
//!     }
//! });
//! while let Some(_events) = panel.next_events().await {
//!     // render
//! }
//! # Ok(())
//! # }
//! ```

mod dispatcher;
pub mod events;
mod guard;
pub mod prompt;
pub mod reconcile;
pub mod scheduler;
mod worker;

use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::Result;
use crate::api::models::{ActiveConnectionDetails, ConnectionError, NetworkSummary};
use crate::backend::Backend;
use crate::config::Settings;
use dispatcher::Dispatcher;
use events::{AttemptStatus, Delivery, Operation, OperationHandle, OperationKind, OperationOutput};
use prompt::{PromptId, PromptReply};
use scheduler::TimerState;

pub use events::{PromptRequest, UiEvent};
pub use guard::ConnectionAttempt;

/// What the panel currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelState {
    /// Reconciled list, active network first.
    pub networks: Vec<NetworkSummary>,
    pub active: Option<String>,
    pub selection: Option<String>,
    /// Last details and the SSID they belong to.
    pub details: Option<ActiveConnectionDetails>,
    pub details_ssid: Option<String>,
    pub password: Option<String>,
    pub busy: bool,
    pub pending_prompt: Option<PromptRequest>,
}

/// Handle returned by [`Coordinator::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&UiEvent)>;

/// Presentation-side facade over the dispatcher.
pub struct Coordinator {
    dispatcher: Arc<Dispatcher>,
    rx: UnboundedReceiver<Delivery>,
    state: PanelState,
    last_applied: [u64; OperationKind::COUNT],
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

impl Coordinator {
    /// Creates a coordinator over `backend` and issues an initial refresh.
    ///
    /// Must be called from within a tokio runtime; otherwise fails with
    /// [`ConnectionError::Runtime`].
    pub fn new(backend: Arc<dyn Backend>, settings: &Settings) -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| ConnectionError::Runtime(e.to_string()))?;
        info!("Coordinator starting with {} backend", backend.name());

        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(backend, settings, handle, tx);

        let coordinator = Self {
            dispatcher,
            rx,
            state: PanelState::default(),
            last_applied: [0; OperationKind::COUNT],
            subscribers: Vec::new(),
            next_subscription: 1,
        };
        coordinator.refresh_now();
        Ok(coordinator)
    }

    /// Rescans, refetches details for the selection and the stored password.
    pub fn refresh_now(&self) {
        self.dispatcher.refresh();
    }

    /// Selects `ssid` and fetches its details.
    pub fn select_network(&mut self, ssid: &str) -> Result<OperationHandle> {
        self.set_selection(Some(ssid.to_string()));
        self.dispatcher.submit(Operation::FetchDetails {
            ssid: Some(ssid.to_string()),
        })
    }

    /// Connects to `ssid`, prompting for a password if one is needed.
    pub fn activate(&self, ssid: &str) -> Result<OperationHandle> {
        self.dispatcher.submit(Operation::Connect {
            ssid: ssid.to_string(),
            password: None,
        })
    }

    /// Connects to `ssid` with a known password, without prompting.
    pub fn activate_with_password(&self, ssid: &str, password: &str) -> Result<OperationHandle> {
        self.dispatcher.submit(Operation::Connect {
            ssid: ssid.to_string(),
            password: Some(password.to_string()),
        })
    }

    /// Disconnects from `ssid`.
    ///
    /// Once a scan has been applied, fails with
    /// [`ConnectionError::NotConnected`] without starting an attempt when
    /// `ssid` is not the known active network. Before that the backend
    /// decides, and a mismatch arrives as a failed
    /// [`UiEvent::AttemptFinished`].
    pub fn deactivate(&self, ssid: &str) -> Result<OperationHandle> {
        let scanned = self.last_applied[OperationKind::Scan.index()] > 0;
        if scanned && self.state.active.as_deref() != Some(ssid) {
            return Err(ConnectionError::NotConnected(ssid.to_string()));
        }
        self.dispatcher.submit(Operation::Disconnect {
            ssid: ssid.to_string(),
        })
    }

    /// Answers a prompt. Returns `false` when the answer came too late or
    /// the prompt is unknown.
    pub fn supply_prompt_result(&mut self, id: PromptId, reply: PromptReply) -> bool {
        if self.state.pending_prompt.as_ref().is_some_and(|p| p.id == id) {
            self.state.pending_prompt = None;
        }
        self.dispatcher.prompts().supply(id, reply)
    }

    /// Stops periodic refresh for good and cancels outstanding prompts.
    pub fn shutdown(&mut self) {
        info!("Coordinator shutting down");
        self.dispatcher.scheduler().stop();
        self.dispatcher.prompts().cancel_all();
        self.state.pending_prompt = None;
    }

    /// Registers a callback invoked for every event, in order.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&UiEvent) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Applies every delivery already queued, without waiting.
    pub fn drain(&mut self) -> Vec<UiEvent> {
        let mut events = Vec::new();
        while let Ok(delivery) = self.rx.try_recv() {
            events.extend(self.apply(delivery));
        }
        self.publish(&events);
        events
    }

    /// Waits for at least one delivery, then applies everything queued.
    ///
    /// The batch may be empty when the only delivery was a stale result.
    pub async fn next_events(&mut self) -> Option<Vec<UiEvent>> {
        let first = self.rx.recv().await?;
        let mut events = self.apply(first);
        while let Ok(delivery) = self.rx.try_recv() {
            events.extend(self.apply(delivery));
        }
        self.publish(&events);
        Some(events)
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state.busy
    }

    /// The attempt holding the connection guard right now, if any.
    pub fn current_attempt(&self) -> Option<ConnectionAttempt> {
        self.dispatcher.current_attempt()
    }

    pub fn refresh_state(&self) -> TimerState {
        self.dispatcher.scheduler().state()
    }

    fn publish(&mut self, events: &[UiEvent]) {
        for event in events {
            for (_, callback) in self.subscribers.iter_mut() {
                callback(event);
            }
        }
    }

    fn set_selection(&mut self, selection: Option<String>) {
        if self.state.selection != selection {
            self.dispatcher.set_focus(selection.clone());
            self.state.selection = selection;
        }
    }

    fn apply(&mut self, delivery: Delivery) -> Vec<UiEvent> {
        match delivery {
            Delivery::Prompt(request) => {
                self.state.pending_prompt = Some(request.clone());
                vec![UiEvent::PromptRequested(request)]
            }
            Delivery::Attempt(status) => {
                self.state.busy = matches!(status, AttemptStatus::Busy { .. });
                vec![UiEvent::AttemptChanged(status)]
            }
            Delivery::Completed {
                kind,
                generation,
                ssid,
                result,
            } => {
                let last = &mut self.last_applied[kind.index()];
                if generation <= *last {
                    debug!("Discarding stale {kind} #{generation}, already applied #{last}");
                    return Vec::new();
                }
                *last = generation;

                if kind.is_attempt() {
                    self.finish_attempt(kind, ssid.unwrap_or_default(), result)
                } else {
                    match result {
                        Ok(output) => self.apply_output(output),
                        Err(error) => {
                            warn!("{kind} failed: {error}");
                            vec![UiEvent::OperationFailed { kind, error }]
                        }
                    }
                }
            }
        }
    }

    fn finish_attempt(
        &mut self,
        kind: OperationKind,
        ssid: String,
        result: Result<OperationOutput>,
    ) -> Vec<UiEvent> {
        if self
            .state
            .pending_prompt
            .as_ref()
            .is_some_and(|p| p.ssid == ssid)
        {
            self.state.pending_prompt = None;
        }

        let outcome = result.map(|_| ());
        let mut events = vec![UiEvent::AttemptFinished {
            kind,
            ssid: ssid.clone(),
            outcome: outcome.clone(),
        }];

        match outcome {
            Ok(()) => info!("{kind} of '{ssid}' finished"),
            Err(error) if error.is_abandonment() => {
                info!("{kind} of '{ssid}' abandoned: {error}");
            }
            Err(error) => {
                error!("{kind} of '{ssid}' failed: {error}");
                events.push(UiEvent::OperationFailed { kind, error });
            }
        }

        self.refresh_now();
        events
    }

    fn apply_output(&mut self, output: OperationOutput) -> Vec<UiEvent> {
        match output {
            OperationOutput::Networks { networks, active } => {
                let merged = reconcile::merge(networks, active.as_deref());
                let keep = self
                    .state
                    .selection
                    .as_ref()
                    .filter(|s| merged.networks.iter().any(|n| &n.ssid == *s))
                    .cloned();
                self.set_selection(keep.or(merged.selection));
                self.state.active = active;
                self.state.networks = merged.networks.clone();

                vec![UiEvent::NetworksUpdated {
                    networks: merged.networks,
                    selection: self.state.selection.clone(),
                }]
            }
            OperationOutput::Details { ssid, details } => {
                let network = ssid
                    .as_ref()
                    .and_then(|s| self.state.networks.iter().find(|n| &n.ssid == s))
                    .cloned();
                self.state.details = Some(details.clone());
                self.state.details_ssid = ssid.clone();
                vec![UiEvent::DetailsUpdated {
                    ssid,
                    network,
                    details,
                }]
            }
            OperationOutput::Password { ssid, password } => {
                self.state.password = password.clone();
                vec![UiEvent::PasswordUpdated { ssid, password }]
            }
            OperationOutput::AttemptDone => Vec::new(),
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.dispatcher.scheduler().stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::Security;
    use crate::backend::MockBackend;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn networks(names: &[&str]) -> Vec<NetworkSummary> {
        names
            .iter()
            .map(|n| NetworkSummary::new(*n, Some(50), Security::Open))
            .collect()
    }

    fn scan(generation: u64, names: &[&str], active: Option<&str>) -> Delivery {
        Delivery::Completed {
            kind: OperationKind::Scan,
            generation,
            ssid: None,
            result: Ok(OperationOutput::Networks {
                networks: networks(names),
                active: active.map(str::to_string),
            }),
        }
    }

    fn coordinator() -> Coordinator {
        Coordinator::new(Arc::new(MockBackend::new()), &Settings::default()).unwrap()
    }

    #[tokio::test]
    async fn stale_results_are_discarded() {
        let mut c = coordinator();
        let tx = c.dispatcher.sender();
        tx.send(scan(10, &["Fresh"], None)).unwrap();
        tx.send(scan(9, &["Stale"], None)).unwrap();

        let events = c.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(c.state().networks.len(), 1);
        assert_eq!(c.state().networks[0].ssid, "Fresh");
    }

    #[tokio::test]
    async fn user_selection_survives_refresh_while_listed() {
        let mut c = coordinator();
        let tx = c.dispatcher.sender();

        tx.send(scan(10, &["Cafe", "Home"], Some("Home"))).unwrap();
        c.drain();
        assert_eq!(c.state().selection.as_deref(), Some("Home"));

        c.select_network("Cafe").unwrap();
        tx.send(scan(11, &["Cafe", "Home"], Some("Home"))).unwrap();
        c.drain();
        assert_eq!(c.state().selection.as_deref(), Some("Cafe"));

        tx.send(scan(12, &["Home"], Some("Home"))).unwrap();
        c.drain();
        assert_eq!(c.state().selection.as_deref(), Some("Home"));
        assert_eq!(c.state().active.as_deref(), Some("Home"));
    }

    #[tokio::test]
    async fn subscribers_see_events_until_removed() {
        let mut c = coordinator();
        let seen = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&seen);
        let id = c.subscribe(move |_| *counter.borrow_mut() += 1);

        let tx = c.dispatcher.sender();
        tx.send(scan(10, &["A"], None)).unwrap();
        c.drain();
        assert_eq!(*seen.borrow(), 1);

        assert!(c.unsubscribe(id));
        assert!(!c.unsubscribe(id));
        tx.send(scan(11, &["A"], None)).unwrap();
        c.drain();
        assert_eq!(*seen.borrow(), 1);
    }

    #[tokio::test]
    async fn deactivate_unknown_network_does_not_take_guard() {
        let mut c = coordinator();
        c.dispatcher.sender().send(scan(10, &["Home"], Some("Home"))).unwrap();
        c.drain();
        assert_eq!(
            c.deactivate("Ghost").unwrap_err(),
            ConnectionError::NotConnected("Ghost".into())
        );
        assert_eq!(c.current_attempt(), None);
        assert!(c.drain().iter().all(|e| !matches!(e, UiEvent::AttemptChanged(_))));
    }

    #[tokio::test]
    async fn deactivate_before_first_scan_asks_backend() {
        let mock = MockBackend::new()
            .with_network("Home", Some(80), Security::Wpa2)
            .with_active("Home");
        let mut c = Coordinator::new(Arc::new(mock), &Settings::default()).unwrap();
        assert_eq!(c.state().active, None);

        c.deactivate("Home").unwrap();
        let outcome = loop {
            let events = c.next_events().await.unwrap();
            let finished = events.into_iter().find_map(|e| match e {
                UiEvent::AttemptFinished {
                    kind: OperationKind::Disconnect,
                    outcome,
                    ..
                } => Some(outcome),
                _ => None,
            });
            if let Some(outcome) = finished {
                break outcome;
            }
        };
        assert_eq!(outcome, Ok(()));
    }

    #[test]
    fn requires_runtime() {
        let result = Coordinator::new(Arc::new(MockBackend::new()), &Settings::default());
        assert!(matches!(result, Err(ConnectionError::Runtime(_))));
    }
}
