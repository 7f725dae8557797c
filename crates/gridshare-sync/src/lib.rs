//! Persistence lifecycle for a gridshare spreadsheet.
//!
//! This crate provides:
//! - `ReadinessGate`: one-shot readiness of the embedded editing surface
//! - `DocumentSyncController`: share, update, delete, import and export of the
//!   grid, with autosave while bound to a remote blob
//! - Capability traits the host implements (`EditingSurface`, `Navigator`,
//!   `NotificationSink`)

mod autosave;
mod controller;
mod document;
mod error;
mod platform;
mod readiness;
mod state;

pub use autosave::{AutosaveErrorFilter, DEFAULT_AUTOSAVE_PERIOD};
pub use controller::{ControllerBuilder, DocumentSyncController};
pub use document::{
    BLANK_COLUMNS, BLANK_ROWS, BLANK_SHEET_NAME, BLANK_TITLE, DEFAULT_COLUMN_WIDTH,
    DEFAULT_ROW_HEIGHT, Document,
};
pub use error::{SurfaceError, SyncError};
pub use platform::{
    EditingSurface, IMPORT_EXTENSIONS, ImportFile, Navigator, NoopNavigator, Notification,
    NotificationLevel, NotificationSink, TracingNotifier,
};
pub use readiness::{ReadinessGate, ReadinessState, ReadySignal};
pub use state::{
    ActionAvailability, ActionState, Operation, Outcome, RemoteBinding, Route, Skip, SyncStatus,
};

// Re-export store types that hosts need to build a controller
pub use gridshare_common::{BlobStore, JsonBlobClient, StoreError};
