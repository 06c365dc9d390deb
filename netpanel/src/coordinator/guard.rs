//! Mutual exclusion for connect/disconnect attempts.
//!
//! At most one [`ConnectionAttempt`] exists at a time. Beginning one pauses
//! the refresh scheduler; dropping the [`AttemptToken`] ends it and resumes
//! the scheduler, so the guard is released on every exit path of a worker,
//! including a panic.

use log::{debug, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;

use super::events::{AttemptStatus, Delivery, OperationKind};
use super::scheduler::RefreshScheduler;
use crate::Result;
use crate::api::models::ConnectionError;

/// The attempt currently holding the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionAttempt {
    pub id: u64,
    pub kind: OperationKind,
    pub ssid: String,
    pub started_at: Instant,
}

#[derive(Debug)]
pub(crate) struct ConnectionGuard {
    current: Mutex<Option<ConnectionAttempt>>,
    next_id: AtomicU64,
    scheduler: Arc<RefreshScheduler>,
    tx: UnboundedSender<Delivery>,
}

impl ConnectionGuard {
    pub(crate) fn new(scheduler: Arc<RefreshScheduler>, tx: UnboundedSender<Delivery>) -> Self {
        Self {
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
            scheduler,
            tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ConnectionAttempt>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Starts an attempt on `ssid`, or fails with [`ConnectionError::Busy`].
    ///
    /// The scheduler pause and the `Busy` notification happen under the
    /// lock, so they can never interleave with the release of a previous
    /// attempt.
    pub(crate) fn try_begin(
        self: &Arc<Self>,
        kind: OperationKind,
        ssid: &str,
    ) -> Result<AttemptToken> {
        let mut current = self.lock();
        if let Some(existing) = current.as_ref() {
            debug!(
                "Rejecting {kind} of '{ssid}': {} of '{}' in progress",
                existing.kind, existing.ssid
            );
            return Err(ConnectionError::Busy);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        *current = Some(ConnectionAttempt {
            id,
            kind,
            ssid: ssid.to_string(),
            started_at: Instant::now(),
        });
        self.scheduler.pause();
        self.notify(AttemptStatus::Busy {
            kind,
            ssid: ssid.to_string(),
        });
        drop(current);

        info!("Started {kind} attempt #{id} for '{ssid}'");
        Ok(AttemptToken {
            guard: Arc::clone(self),
            id,
            ssid: ssid.to_string(),
        })
    }

    /// Ends the attempt held by `token`.
    pub(crate) fn end(&self, token: AttemptToken) {
        drop(token);
    }

    pub(crate) fn current(&self) -> Option<ConnectionAttempt> {
        self.lock().clone()
    }

    fn release(&self, id: u64, ssid: &str) {
        let mut current = self.lock();
        if !current.as_ref().is_some_and(|attempt| attempt.id == id) {
            return;
        }
        let started_at = current.take().map(|attempt| attempt.started_at);
        self.scheduler.resume();
        self.notify(AttemptStatus::Free);
        drop(current);

        if let Some(started_at) = started_at {
            debug!(
                "Attempt #{id} for '{ssid}' released after {:?}",
                started_at.elapsed()
            );
        }
    }

    /// Attempt and scheduler state read together under the lock.
    #[cfg(test)]
    fn snapshot(&self) -> (Option<ConnectionAttempt>, super::scheduler::TimerState) {
        let current = self.lock();
        (current.clone(), self.scheduler.state())
    }

    fn notify(&self, status: AttemptStatus) {
        if self.tx.send(Delivery::Attempt(status)).is_err() {
            debug!("Attempt status not delivered, receiver gone");
        }
    }
}

/// Proof of holding the connection guard. Dropping it ends the attempt.
#[derive(Debug)]
pub(crate) struct AttemptToken {
    guard: Arc<ConnectionGuard>,
    id: u64,
    ssid: String,
}

impl AttemptToken {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for AttemptToken {
    fn drop(&mut self) {
        self.guard.release(self.id, &self.ssid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::scheduler::TimerState;
    use std::time::Duration;
    use tokio::runtime::Handle;
    use tokio::sync::mpsc;

    fn guard() -> (Arc<ConnectionGuard>, mpsc::UnboundedReceiver<Delivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = RefreshScheduler::start(&Handle::current(), Duration::from_secs(5), || {});
        (Arc::new(ConnectionGuard::new(scheduler, tx)), rx)
    }

    fn statuses(rx: &mut mpsc::UnboundedReceiver<Delivery>) -> Vec<AttemptStatus> {
        let mut out = Vec::new();
        while let Ok(delivery) = rx.try_recv() {
            if let Delivery::Attempt(status) = delivery {
                out.push(status);
            }
        }
        out
    }

    #[tokio::test]
    async fn second_attempt_is_busy_until_first_ends() {
        let (guard, mut rx) = guard();

        let token = guard.try_begin(OperationKind::Connect, "Cafe").unwrap();
        assert_eq!(
            guard.try_begin(OperationKind::Connect, "Home").unwrap_err(),
            ConnectionError::Busy
        );
        assert_eq!(guard.current().map(|a| a.ssid), Some("Cafe".to_string()));
        assert_eq!(guard.scheduler.state(), TimerState::Paused);

        guard.end(token);
        assert_eq!(guard.current(), None);
        assert_eq!(guard.scheduler.state(), TimerState::Running);

        let again = guard.try_begin(OperationKind::Disconnect, "Home").unwrap();
        assert_ne!(again.id(), 0);
        drop(again);

        assert_eq!(
            statuses(&mut rx),
            vec![
                AttemptStatus::Busy {
                    kind: OperationKind::Connect,
                    ssid: "Cafe".into()
                },
                AttemptStatus::Free,
                AttemptStatus::Busy {
                    kind: OperationKind::Disconnect,
                    ssid: "Home".into()
                },
                AttemptStatus::Free,
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_begins_admit_exactly_one() {
        let (guard, _rx) = guard();
        let tasks: Vec<_> = ["A", "B", "C", "D", "E", "F", "G", "H"]
            .into_iter()
            .map(|ssid| {
                let guard = Arc::clone(&guard);
                tokio::spawn(async move {
                    guard
                        .try_begin(OperationKind::Connect, ssid)
                        .map(std::mem::forget)
                        .is_ok()
                })
            })
            .collect();

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
        assert!(guard.current().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn handover_between_attempts_keeps_refresh_paused() {
        let (guard, mut rx) = guard();

        for round in 0..2_000 {
            let first = guard.try_begin(OperationKind::Connect, "Cafe").unwrap();
            let releaser = std::thread::spawn(move || drop(first));

            let second = loop {
                match guard.try_begin(OperationKind::Connect, "Home") {
                    Ok(token) => break token,
                    Err(ConnectionError::Busy) => std::hint::spin_loop(),
                    Err(e) => panic!("unexpected error: {e}"),
                }
            };
            releaser.join().unwrap();

            let (held, state) = guard.snapshot();
            assert_eq!(held.map(|a| a.ssid), Some("Home".to_string()), "round {round}");
            assert_eq!(state, TimerState::Paused, "round {round}");

            drop(second);
            assert_eq!(guard.snapshot(), (None, TimerState::Running));
        }

        let seen = statuses(&mut rx);
        assert_eq!(seen.len(), 2_000 * 4);
        for pair in seen.chunks(2) {
            assert!(matches!(pair[0], AttemptStatus::Busy { .. }));
            assert_eq!(pair[1], AttemptStatus::Free);
        }
    }

    #[tokio::test]
    async fn release_survives_panicking_holder() {
        let (guard, _rx) = guard();
        let held = Arc::clone(&guard);
        let result = tokio::spawn(async move {
            let _token = held.try_begin(OperationKind::Connect, "Cafe").unwrap();
            panic!("boom");
        })
        .await;

        assert!(result.is_err());
        assert_eq!(guard.current(), None);
        assert_eq!(guard.scheduler.state(), TimerState::Running);
    }
}
