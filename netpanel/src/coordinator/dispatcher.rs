//! Runs each submitted operation on its own task and posts the result back.

use futures::FutureExt;
use log::{debug, warn};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;

use super::events::{Delivery, Operation, OperationHandle, OperationKind};
use super::guard::{AttemptToken, ConnectionAttempt, ConnectionGuard};
use super::prompt::PromptBridge;
use super::scheduler::RefreshScheduler;
use super::worker::{self, WorkerContext};
use crate::Result;
use crate::api::models::ConnectionError;
use crate::backend::Backend;
use crate::config::Settings;

pub(crate) struct Dispatcher {
    ctx: Arc<WorkerContext>,
    tx: UnboundedSender<Delivery>,
    handle: Handle,
    generations: [AtomicU64; OperationKind::COUNT],
    guard: Arc<ConnectionGuard>,
    scheduler: Arc<RefreshScheduler>,
    /// SSID the periodic details refresh targets; the active network if unset.
    focus: Mutex<Option<String>>,
}

impl Dispatcher {
    /// Builds the dispatcher and starts its refresh scheduler.
    pub(crate) fn new(
        backend: Arc<dyn Backend>,
        settings: &Settings,
        handle: Handle,
        tx: UnboundedSender<Delivery>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Dispatcher>| {
            let ticker = me.clone();
            let scheduler = RefreshScheduler::start(&handle, settings.refresh_interval(), move || {
                if let Some(dispatcher) = ticker.upgrade() {
                    dispatcher.tick();
                }
            });
            let prompts = Arc::new(PromptBridge::new(tx.clone()));
            let guard = Arc::new(ConnectionGuard::new(Arc::clone(&scheduler), tx.clone()));

            Dispatcher {
                ctx: Arc::new(WorkerContext {
                    backend,
                    prompts,
                    operation_timeout: settings.operation_timeout(),
                    prompt_timeout: settings.prompt_timeout(),
                }),
                tx,
                handle,
                generations: Default::default(),
                guard,
                scheduler,
                focus: Mutex::new(None),
            }
        })
    }

    /// Spawns a worker for `op`.
    ///
    /// Connect and disconnect take the connection guard first and fail with
    /// [`ConnectionError::Busy`] when another attempt holds it.
    pub(crate) fn submit(&self, op: Operation) -> Result<OperationHandle> {
        let kind = op.kind();
        let token = if kind.is_attempt() {
            let ssid = op.ssid().unwrap_or_default().to_string();
            Some(self.guard.try_begin(kind, &ssid)?)
        } else {
            None
        };

        let generation = self.generations[kind.index()].fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Submitting {op:?} as {kind} #{generation}");
        self.spawn(op, generation, token);

        Ok(OperationHandle { kind, generation })
    }

    fn spawn(&self, op: Operation, generation: u64, token: Option<AttemptToken>) {
        let ctx = Arc::clone(&self.ctx);
        let guard = Arc::clone(&self.guard);
        let tx = self.tx.clone();
        let kind = op.kind();
        let ssid = op.ssid().map(str::to_string);

        self.handle.spawn(async move {
            let result = AssertUnwindSafe(worker::run(&ctx, op, token.as_ref()))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    let msg = panic_message(payload.as_ref());
                    warn!("{kind} worker #{generation} panicked: {msg}");
                    Err(ConnectionError::Aborted(msg))
                });

            let completed = Delivery::Completed {
                kind,
                generation,
                ssid,
                result,
            };
            if tx.send(completed).is_err() {
                debug!("Dropping {kind} #{generation} result, receiver gone");
            }
            // Released only after the result is queued, so "free" follows it.
            if let Some(token) = token {
                guard.end(token);
            }
        });
    }

    /// Scheduler tick: list, details and stored password.
    fn tick(&self) {
        debug!("Periodic refresh");
        self.refresh();
    }

    pub(crate) fn refresh(&self) {
        let focus = self.focus.lock().unwrap_or_else(|e| e.into_inner()).clone();
        for op in [
            Operation::Scan,
            Operation::FetchDetails { ssid: focus },
            Operation::FetchPassword,
        ] {
            if let Err(e) = self.submit(op) {
                warn!("Refresh submission failed: {e}");
            }
        }
    }

    pub(crate) fn set_focus(&self, ssid: Option<String>) {
        *self.focus.lock().unwrap_or_else(|e| e.into_inner()) = ssid;
    }

    pub(crate) fn prompts(&self) -> &PromptBridge {
        &self.ctx.prompts
    }

    pub(crate) fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    pub(crate) fn current_attempt(&self) -> Option<ConnectionAttempt> {
        self.guard.current()
    }

    #[cfg(test)]
    pub(crate) fn sender(&self) -> UnboundedSender<Delivery> {
        self.tx.clone()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::backend::mock::MockOp;
    use crate::coordinator::events::{AttemptStatus, OperationOutput};
    use tokio::sync::mpsc;

    fn dispatcher(mock: Arc<MockBackend>) -> (Arc<Dispatcher>, mpsc::UnboundedReceiver<Delivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let d = Dispatcher::new(mock, &Settings::default(), Handle::current(), tx);
        (d, rx)
    }

    #[tokio::test]
    async fn generations_increase_per_kind() {
        let (d, _rx) = dispatcher(Arc::new(MockBackend::with_sample_networks()));
        let a = d.submit(Operation::Scan).unwrap();
        let b = d.submit(Operation::Scan).unwrap();
        let c = d.submit(Operation::FetchPassword).unwrap();
        assert_eq!((a.generation, b.generation, c.generation), (1, 2, 1));
        assert_eq!(c.kind, OperationKind::FetchPassword);
    }

    #[tokio::test]
    async fn panic_is_delivered_as_aborted_and_guard_released() {
        let mock = Arc::new(MockBackend::with_sample_networks());
        mock.panic_on(MockOp::Disconnect);
        let (d, mut rx) = dispatcher(mock);

        d.submit(Operation::Disconnect {
            ssid: "Home_Fiber_5G".into(),
        })
        .unwrap();

        let mut seen = Vec::new();
        while let Some(delivery) = rx.recv().await {
            let done = matches!(delivery, Delivery::Attempt(AttemptStatus::Free));
            seen.push(delivery);
            if done {
                break;
            }
        }

        assert!(matches!(seen[0], Delivery::Attempt(AttemptStatus::Busy { .. })));
        match &seen[1] {
            Delivery::Completed { kind, result, .. } => {
                assert_eq!(*kind, OperationKind::Disconnect);
                assert!(matches!(
                    result,
                    Err(ConnectionError::Aborted(msg)) if msg.contains("scripted panic")
                ));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(d.current_attempt(), None);
    }

    #[tokio::test]
    async fn scan_result_is_delivered() {
        let (d, mut rx) = dispatcher(Arc::new(MockBackend::with_sample_networks()));
        d.submit(Operation::Scan).unwrap();
        match rx.recv().await {
            Some(Delivery::Completed {
                generation: 1,
                result: Ok(OperationOutput::Networks { networks, active }),
                ..
            }) => {
                assert_eq!(networks.len(), 5);
                assert_eq!(active.as_deref(), Some("Home_Fiber_5G"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
