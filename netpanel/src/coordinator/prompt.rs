//! Password prompts requested by workers and answered by the presentation loop.
//!
//! A worker posts a [`PromptRequest`] through the delivery channel and then
//! waits on a oneshot slot until the deadline. The presentation side answers
//! with [`PromptBridge::supply`]. Every pending prompt is resolved exactly
//! once; answers for unknown, resolved or expired prompts are ignored.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tokio::time::{Instant, timeout_at};
use uuid::Uuid;

use super::events::{Delivery, PromptRequest};
use crate::Result;
use crate::api::models::ConnectionError;

/// Identifies one prompt between the worker and the presentation side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PromptId(Uuid);

impl PromptId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for PromptId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The user's answer to a prompt.
#[derive(Clone, PartialEq, Eq)]
pub enum PromptReply {
    Password(String),
    Cancelled,
}

impl std::fmt::Debug for PromptReply {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password(_) => write!(f, "Password(<redacted>)"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// How a prompt was resolved, as seen by the waiting worker.
#[derive(Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    Password(String),
    Cancelled,
    TimedOut,
}

impl std::fmt::Debug for PromptOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password(_) => write!(f, "Password(<redacted>)"),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::TimedOut => write!(f, "TimedOut"),
        }
    }
}

impl From<PromptReply> for PromptOutcome {
    fn from(reply: PromptReply) -> Self {
        match reply {
            PromptReply::Password(pw) => Self::Password(pw),
            PromptReply::Cancelled => Self::Cancelled,
        }
    }
}

#[derive(Debug)]
struct PendingPrompt {
    ssid: String,
    attempt: u64,
    slot: oneshot::Sender<PromptReply>,
    deadline: Instant,
}

#[derive(Debug)]
pub(crate) struct PromptBridge {
    pending: Mutex<HashMap<PromptId, PendingPrompt>>,
    tx: UnboundedSender<Delivery>,
}

/// Removes the entry when the waiting worker goes away, however it exits.
struct PendingCleanup<'a> {
    bridge: &'a PromptBridge,
    id: PromptId,
}

impl Drop for PendingCleanup<'_> {
    fn drop(&mut self) {
        self.bridge.take(self.id);
    }
}

impl PromptBridge {
    pub(crate) fn new(tx: UnboundedSender<Delivery>) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PromptId, PendingPrompt>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take(&self, id: PromptId) -> Option<PendingPrompt> {
        self.lock().remove(&id)
    }

    /// Asks the presentation side for the password of `ssid` and waits up to
    /// `timeout` for the answer.
    ///
    /// Fails with [`ConnectionError::PromptAlreadyPending`] when `attempt`
    /// already has an unresolved prompt.
    pub(crate) async fn request_password(
        &self,
        attempt: u64,
        ssid: &str,
        timeout: Duration,
    ) -> Result<PromptOutcome> {
        let id = PromptId::new();
        let deadline = Instant::now() + timeout;
        let (slot, mut rx) = oneshot::channel();

        {
            let mut pending = self.lock();
            if pending.values().any(|p| p.attempt == attempt) {
                warn!("Attempt #{attempt} already has a pending prompt");
                return Err(ConnectionError::PromptAlreadyPending);
            }
            pending.insert(
                id,
                PendingPrompt {
                    ssid: ssid.to_string(),
                    attempt,
                    slot,
                    deadline,
                },
            );
        }
        let _cleanup = PendingCleanup { bridge: self, id };

        let request = PromptRequest {
            id,
            ssid: ssid.to_string(),
            deadline,
        };
        if self.tx.send(Delivery::Prompt(request)).is_err() {
            debug!("Prompt {id} for '{ssid}' has nobody to answer it");
            return Ok(PromptOutcome::Cancelled);
        }
        debug!("Waiting up to {timeout:?} for password of '{ssid}' (prompt {id})");

        match timeout_at(deadline, &mut rx).await {
            Ok(Ok(reply)) => Ok(reply.into()),
            // Slot dropped without an answer: the bridge was shut down.
            Ok(Err(_)) => Ok(PromptOutcome::Cancelled),
            Err(_) => {
                if self.take(id).is_some() {
                    info!("Password prompt for '{ssid}' timed out");
                    return Ok(PromptOutcome::TimedOut);
                }
                // An answer won the race against the deadline.
                match rx.try_recv() {
                    Ok(reply) => Ok(reply.into()),
                    Err(_) => Ok(PromptOutcome::Cancelled),
                }
            }
        }
    }

    /// Resolves prompt `id` with `reply`.
    ///
    /// Returns `false`, and does nothing, when the prompt is unknown,
    /// already resolved, or past its deadline.
    pub(crate) fn supply(&self, id: PromptId, reply: PromptReply) -> bool {
        let prompt = {
            let mut pending = self.lock();
            match pending.get(&id) {
                None => None,
                Some(p) if Instant::now() >= p.deadline => None,
                Some(_) => pending.remove(&id),
            }
        };

        match prompt {
            Some(p) => {
                debug!("Prompt {id} for '{}' answered: {reply:?}", p.ssid);
                p.slot.send(reply).is_ok()
            }
            None => {
                debug!("Ignoring answer for unknown or expired prompt {id}");
                false
            }
        }
    }

    /// Cancels every pending prompt.
    pub(crate) fn cancel_all(&self) {
        let drained: Vec<PendingPrompt> = self.lock().drain().map(|(_, p)| p).collect();
        for prompt in drained {
            let _ = prompt.slot.send(PromptReply::Cancelled);
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn bridge() -> (Arc<PromptBridge>, mpsc::UnboundedReceiver<Delivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(PromptBridge::new(tx)), rx)
    }

    async fn next_prompt(rx: &mut mpsc::UnboundedReceiver<Delivery>) -> PromptRequest {
        match rx.recv().await {
            Some(Delivery::Prompt(request)) => request,
            other => panic!("expected a prompt, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn answer_reaches_the_worker() {
        let (bridge, mut rx) = bridge();
        let worker = {
            let bridge = Arc::clone(&bridge);
            tokio::spawn(async move {
                bridge
                    .request_password(1, "Secure-AP", Duration::from_secs(300))
                    .await
            })
        };

        let request = next_prompt(&mut rx).await;
        assert_eq!(request.ssid, "Secure-AP");
        assert!(bridge.supply(request.id, PromptReply::Password("hunter2".into())));
        assert!(!bridge.supply(request.id, PromptReply::Cancelled));

        assert_eq!(
            worker.await.unwrap().unwrap(),
            PromptOutcome::Password("hunter2".into())
        );
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn late_answer_after_timeout_is_ignored() {
        let (bridge, mut rx) = bridge();
        let worker = {
            let bridge = Arc::clone(&bridge);
            tokio::spawn(async move {
                bridge
                    .request_password(1, "Secure-AP", Duration::from_secs(300))
                    .await
            })
        };

        let request = next_prompt(&mut rx).await;
        tokio::time::sleep(Duration::from_secs(301)).await;

        assert_eq!(worker.await.unwrap().unwrap(), PromptOutcome::TimedOut);
        assert!(!bridge.supply(request.id, PromptReply::Password("hunter2".into())));
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn second_prompt_for_same_attempt_fails_fast() {
        let (bridge, mut rx) = bridge();
        let first = {
            let bridge = Arc::clone(&bridge);
            tokio::spawn(async move {
                bridge
                    .request_password(7, "Secure-AP", Duration::from_secs(300))
                    .await
            })
        };
        let request = next_prompt(&mut rx).await;

        assert_eq!(
            bridge
                .request_password(7, "Secure-AP", Duration::from_secs(300))
                .await,
            Err(ConnectionError::PromptAlreadyPending)
        );

        assert!(bridge.supply(request.id, PromptReply::Cancelled));
        assert_eq!(first.await.unwrap().unwrap(), PromptOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_releases_waiters() {
        let (bridge, mut rx) = bridge();
        let worker = {
            let bridge = Arc::clone(&bridge);
            tokio::spawn(async move {
                bridge
                    .request_password(1, "Secure-AP", Duration::from_secs(300))
                    .await
            })
        };
        let request = next_prompt(&mut rx).await;

        bridge.cancel_all();
        assert_eq!(worker.await.unwrap().unwrap(), PromptOutcome::Cancelled);
        assert!(!bridge.supply(request.id, PromptReply::Password("late".into())));
    }

    #[tokio::test]
    async fn unknown_prompt_is_a_no_op() {
        let (bridge, _rx) = bridge();
        assert!(!bridge.supply(PromptId::new(), PromptReply::Cancelled));
    }

    #[tokio::test]
    async fn no_listener_cancels() {
        let (bridge, rx) = bridge();
        drop(rx);
        assert_eq!(
            bridge
                .request_password(1, "Secure-AP", Duration::from_secs(1))
                .await
                .unwrap(),
            PromptOutcome::Cancelled
        );
        assert_eq!(bridge.pending_count(), 0);
    }
}
