//! Asynchronous Wi-Fi operation coordinator for desktop network panels.
//!
//! The crate keeps a user interface responsive while it talks to a network
//! management service:
//!
//! - Scans, connects, disconnects and secret lookups run on worker tasks
//! - Results come back in order over a single channel, stale ones are dropped
//! - At most one connect/disconnect attempt runs at a time
//! - A periodic refresh pauses while an attempt is in flight
//! - Password prompts are answered by the UI with a bounded wait
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use netpanel::{Coordinator, PromptReply, Settings, UiEvent, backend};
//!
//! # async fn example() -> netpanel::Result<()> {
//! let settings = Settings::load();
//! let backend = backend::open(settings.backend).await?;
//! let mut panel = Coordinator::new(backend, &settings)?;
//!
//! while let Some(events) = panel.next_events().await {
//!     for event in events {
//!         match event {
//!             UiEvent::NetworksUpdated { networks, .. } => {
//!                 for net in &networks {
//!                     println!("{} ({})", net.ssid, net.signal_label());
//!                 }
//!             }
//!             UiEvent::PromptRequested(prompt) => {
//!                 panel.supply_prompt_result(prompt.id, PromptReply::Password("hunter2".into()));
//!             }
//!             _ => {}
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Backends
//!
//! [`backend::Backend`] is implemented for NetworkManager over D-Bus, for the
//! `nmcli` command line tool and for an in-memory mock used in tests. The
//! D-Bus adapter waits for activation through NetworkManager's state change
//! signals rather than polling.
//!
//! # Error Handling
//!
//! All operations return `Result<T, ConnectionError>`. Transport failures are
//! folded into [`ConnectionError::Backend`]; worker panics are reported as
//! [`ConnectionError::Aborted`] and never take the coordinator down.
//!
//! # Logging
//!
//! This crate uses the [`log`](https://docs.rs/log) facade. To see log
//! output, install a logger such as `env_logger`:
//!
//! ```no_run,ignore
//! env_logger::init();
//! // ...
//! ```

// Internal implementation modules
mod core;
mod dbus;
mod types;
mod util;

// Public API modules
pub mod api;
pub mod backend;
pub mod config;
pub mod coordinator;

// Re-exported public API
pub use api::models::{
    AccessPointRef, ActiveConnectionDetails, ActiveConnectionState, ActiveLink, ApFlags,
    ApSecurityFlags, ConnectionError, ConnectionStateReason, NetworkSummary, Security,
    connection_state_reason_to_error,
};
pub use backend::{Backend, BackendKind, MockBackend, NetworkManagerBackend, NmcliBackend};
pub use config::Settings;
pub use coordinator::events::{AttemptStatus, Operation, OperationHandle, OperationKind};
pub use coordinator::prompt::{PromptId, PromptReply};
pub use coordinator::scheduler::TimerState;
pub use coordinator::{
    ConnectionAttempt, Coordinator, PanelState, PromptRequest, SubscriptionId, UiEvent,
};

/// A specialized `Result` type for network operations.
pub type Result<T> = std::result::Result<T, ConnectionError>;
