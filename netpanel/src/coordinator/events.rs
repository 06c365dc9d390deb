//! Operations, events and the messages workers post to the presentation loop.

use std::fmt::{Display, Formatter};
use tokio::time::Instant;

use super::prompt::PromptId;
use crate::api::models::{ActiveConnectionDetails, ConnectionError, NetworkSummary};

/// The five operation kinds the dispatcher knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Scan,
    Connect,
    Disconnect,
    FetchDetails,
    FetchPassword,
}

impl OperationKind {
    pub(crate) const COUNT: usize = 5;

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Scan => 0,
            Self::Connect => 1,
            Self::Disconnect => 2,
            Self::FetchDetails => 3,
            Self::FetchPassword => 4,
        }
    }

    /// Connect and disconnect run under the connection guard.
    pub fn is_attempt(self) -> bool {
        matches!(self, Self::Connect | Self::Disconnect)
    }
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scan => write!(f, "scan"),
            Self::Connect => write!(f, "connect"),
            Self::Disconnect => write!(f, "disconnect"),
            Self::FetchDetails => write!(f, "fetch-details"),
            Self::FetchPassword => write!(f, "fetch-password"),
        }
    }
}

/// An operation submitted to the dispatcher, with its payload.
#[derive(Clone, PartialEq, Eq)]
pub enum Operation {
    /// Rescan and re-enumerate visible networks and the active one.
    Scan,
    /// Join `ssid`, prompting for a password when needed and none is given.
    Connect {
        ssid: String,
        password: Option<String>,
    },
    /// Leave `ssid`.
    Disconnect { ssid: String },
    /// Details for `ssid`, or for the active network when `None`.
    FetchDetails { ssid: Option<String> },
    /// Stored secret of the active network.
    FetchPassword,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Scan => OperationKind::Scan,
            Self::Connect { .. } => OperationKind::Connect,
            Self::Disconnect { .. } => OperationKind::Disconnect,
            Self::FetchDetails { .. } => OperationKind::FetchDetails,
            Self::FetchPassword => OperationKind::FetchPassword,
        }
    }

    /// The SSID the operation targets, if any.
    pub fn ssid(&self) -> Option<&str> {
        match self {
            Self::Connect { ssid, .. } | Self::Disconnect { ssid } => Some(ssid),
            Self::FetchDetails { ssid } => ssid.as_deref(),
            Self::Scan | Self::FetchPassword => None,
        }
    }
}

// Hand-written so a supplied password never ends up in logs.
impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect { ssid, password } => f
                .debug_struct("Connect")
                .field("ssid", ssid)
                .field("password", &password.as_ref().map(|_| "<redacted>"))
                .finish(),
            Self::Disconnect { ssid } => f.debug_struct("Disconnect").field("ssid", ssid).finish(),
            Self::FetchDetails { ssid } => {
                f.debug_struct("FetchDetails").field("ssid", ssid).finish()
            }
            Self::Scan => write!(f, "Scan"),
            Self::FetchPassword => write!(f, "FetchPassword"),
        }
    }
}

/// Returned by a submission; identifies the result that will be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationHandle {
    pub kind: OperationKind,
    pub generation: u64,
}

/// A password prompt the presentation layer must show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub id: PromptId,
    pub ssid: String,
    /// After this instant the worker stops waiting and answers are ignored.
    pub deadline: Instant,
}

/// Whether a connection attempt is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptStatus {
    Busy { kind: OperationKind, ssid: String },
    Free,
}

/// Events delivered to subscribers on the presentation loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// A fresh, reconciled network list.
    NetworksUpdated {
        networks: Vec<NetworkSummary>,
        selection: Option<String>,
    },
    /// Details for `ssid`; addressing is filled only for the active network.
    DetailsUpdated {
        ssid: Option<String>,
        network: Option<NetworkSummary>,
        details: ActiveConnectionDetails,
    },
    /// Stored secret of the active network.
    PasswordUpdated {
        ssid: Option<String>,
        password: Option<String>,
    },
    PromptRequested(PromptRequest),
    AttemptChanged(AttemptStatus),
    /// A connect or disconnect ended. Prompt cancellation and timeout show
    /// up here only.
    AttemptFinished {
        kind: OperationKind,
        ssid: String,
        outcome: Result<(), ConnectionError>,
    },
    /// A user-facing failure.
    OperationFailed {
        kind: OperationKind,
        error: ConnectionError,
    },
}

/// Successful worker results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OperationOutput {
    Networks {
        networks: Vec<NetworkSummary>,
        active: Option<String>,
    },
    Details {
        ssid: Option<String>,
        details: ActiveConnectionDetails,
    },
    Password {
        ssid: Option<String>,
        password: Option<String>,
    },
    AttemptDone,
}

/// Messages on the delivery channel, consumed only by the presentation loop.
#[derive(Debug)]
pub(crate) enum Delivery {
    Completed {
        kind: OperationKind,
        generation: u64,
        ssid: Option<String>,
        result: Result<OperationOutput, ConnectionError>,
    },
    Prompt(PromptRequest),
    Attempt(AttemptStatus),
}
