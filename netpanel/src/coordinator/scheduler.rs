//! Periodic refresh timer with pause/resume/stop.
//!
//! One task per scheduler, driven by a `watch` channel holding the timer
//! state. Pausing and resuming only flip the state; they never spawn a
//! second timer.

use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;

/// Lifecycle of the refresh timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Running,
    Paused,
    /// Terminal; no further ticks for the scheduler's lifetime.
    Stopped,
}

/// A cancellable periodic timer invoking `tick` every interval while running.
#[derive(Debug)]
pub struct RefreshScheduler {
    state: watch::Sender<TimerState>,
    interval: Duration,
}

impl RefreshScheduler {
    /// Spawns the timer task on `handle` in the `Running` state.
    ///
    /// The first tick fires one full `interval` after start.
    pub fn start<F>(handle: &Handle, interval: Duration, tick: F) -> Arc<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let (state, mut rx) = watch::channel(TimerState::Running);

        handle.spawn(async move {
            loop {
                let current = *rx.borrow_and_update();
                match current {
                    TimerState::Stopped => break,
                    TimerState::Paused => {
                        if rx.changed().await.is_err() {
                            break;
                        }
                    }
                    TimerState::Running => {
                        tokio::select! {
                            _ = tokio::time::sleep(interval) => {
                                if *rx.borrow() == TimerState::Running {
                                    tick();
                                }
                            }
                            changed = rx.changed() => {
                                if changed.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            debug!("Refresh timer finished");
        });

        debug!("Refresh timer started, interval {interval:?}");
        Arc::new(Self { state, interval })
    }

    /// Suspends ticking. No-op unless running.
    pub fn pause(&self) {
        let changed = self.state.send_if_modified(|s| {
            if *s == TimerState::Running {
                *s = TimerState::Paused;
                true
            } else {
                false
            }
        });
        if changed {
            debug!("Refresh timer paused");
        }
    }

    /// Resumes ticking with a fresh interval. No-op unless paused.
    pub fn resume(&self) {
        let changed = self.state.send_if_modified(|s| {
            if *s == TimerState::Paused {
                *s = TimerState::Running;
                true
            } else {
                false
            }
        });
        if changed {
            debug!("Refresh timer resumed");
        }
    }

    /// Stops the timer permanently.
    pub fn stop(&self) {
        self.state.send_if_modified(|s| {
            if *s == TimerState::Stopped {
                false
            } else {
                *s = TimerState::Stopped;
                true
            }
        });
    }

    pub fn state(&self) -> TimerState {
        *self.state.borrow()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
