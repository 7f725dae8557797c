//! Value types describing where a document stands relative to the store.

use std::fmt;

use gridshare_common::is_valid_identifier;
use smol_str::SmolStr;

use crate::error::SyncError;

/// Which network operation, if any, the controller has in flight.
///
/// At most one is in flight at a time; anything requested meanwhile is
/// rejected rather than queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    /// Fetching the shared document named at mount time.
    Loading,
    Sharing,
    Updating,
    Deleting,
}

impl SyncStatus {
    pub fn is_idle(self) -> bool {
        self == SyncStatus::Idle
    }

    /// The operation holding the network slot, if any.
    pub fn in_flight(self) -> Option<Operation> {
        match self {
            SyncStatus::Idle => None,
            SyncStatus::Loading => Some(Operation::Initialize),
            SyncStatus::Sharing => Some(Operation::Share),
            SyncStatus::Updating => Some(Operation::Update),
            SyncStatus::Deleting => Some(Operation::Delete),
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Loading => "loading",
            SyncStatus::Sharing => "sharing",
            SyncStatus::Updating => "updating",
            SyncStatus::Deleting => "deleting",
        };
        f.write_str(name)
    }
}

/// Controller operations, for logging and rejection reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Initialize,
    Share,
    Update,
    Autosave,
    Delete,
    Import,
    Export,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Initialize => "initialize",
            Operation::Share => "share",
            Operation::Update => "update",
            Operation::Autosave => "autosave",
            Operation::Delete => "delete",
            Operation::Import => "import",
            Operation::Export => "export",
        };
        f.write_str(name)
    }
}

/// Association between the local document and a remote blob.
///
/// Only the controller creates or clears one; updates reuse it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteBinding {
    identifier: SmolStr,
}

impl RemoteBinding {
    pub(crate) fn new(identifier: SmolStr) -> Self {
        Self { identifier }
    }

    pub fn identifier(&self) -> &SmolStr {
        &self.identifier
    }
}

/// Navigation targets the controller asks the host to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// A fresh, unshared document.
    Root,
    /// The shared document with this identifier.
    Document(SmolStr),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Root => "/".to_owned(),
            Route::Document(id) => format!("/{id}"),
        }
    }

    /// Parse an inbound path. `/` is the root, `/{id}` a shared document.
    pub fn from_path(path: &str) -> Option<Self> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            Some(Route::Root)
        } else if is_valid_identifier(trimmed) {
            Some(Route::Document(trimmed.into()))
        } else {
            None
        }
    }

    pub fn identifier(&self) -> Option<&SmolStr> {
        match self {
            Route::Root => None,
            Route::Document(id) => Some(id),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// How a header button should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    Hidden,
    Enabled,
    /// Shown with a spinner; this action is in flight.
    Busy,
    /// Shown but unavailable because something else is in flight.
    Disabled,
}

/// Which actions the header offers right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionAvailability {
    pub share: ActionState,
    pub update: ActionState,
    pub delete: ActionState,
}

impl ActionAvailability {
    pub(crate) fn compute(ready: bool, bound: bool, status: SyncStatus) -> Self {
        let button = |visible: bool, own: SyncStatus| {
            if !visible {
                ActionState::Hidden
            } else if status == own {
                ActionState::Busy
            } else if !ready || !status.is_idle() {
                ActionState::Disabled
            } else {
                ActionState::Enabled
            }
        };
        Self {
            share: button(!bound, SyncStatus::Sharing),
            update: button(bound, SyncStatus::Updating),
            delete: button(bound, SyncStatus::Deleting),
        }
    }
}

/// Why an operation did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// Update/delete without a binding.
    NotBound,
    /// Share while already bound.
    AlreadyBound,
    /// `initialize` ran before, or the user already acted on the grid.
    AlreadyInitialized,
}

/// What a controller operation ended up doing.
///
/// Failures have already been reported to the notification sink by the time
/// the caller sees them.
#[derive(Debug)]
pub enum Outcome {
    Completed,
    /// The surface is not ready; nothing happened.
    NotReady,
    /// Another operation is in flight; nothing happened.
    Rejected {
        requested: Operation,
        in_flight: Operation,
    },
    Skipped(Skip),
    Failed(SyncError),
    /// The controller was torn down; any result was dropped.
    Discarded,
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed)
    }

    /// Collapse into a `Result`, treating skips and discards as success.
    pub fn into_result(self) -> Result<(), SyncError> {
        match self {
            Outcome::Completed | Outcome::Skipped(_) | Outcome::Discarded => Ok(()),
            Outcome::NotReady => Err(SyncError::NotReady),
            Outcome::Rejected {
                requested,
                in_flight,
            } => Err(SyncError::ReentrancyRejected {
                requested,
                in_flight,
            }),
            Outcome::Failed(e) => Err(e),
        }
    }
}
