//! Capability traits the controller is handed at construction.
//!
//! These define the boundary between the sync lifecycle and the host: the
//! embedded grid editor, the router and whatever shows toasts. The browser
//! host implements them over the DOM, the CLI over files and stdout, tests
//! over in-memory recorders.

use bytes::Bytes;
use smol_str::SmolStr;

use crate::document::Document;
use crate::error::SurfaceError;
use crate::state::Route;

/// File extensions the surface accepts for import.
pub const IMPORT_EXTENSIONS: &[&str] = &["xlsx", "xls"];

/// A user-picked file to import into the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFile {
    pub name: SmolStr,
    pub contents: Bytes,
}

impl ImportFile {
    pub fn new(name: impl Into<SmolStr>, contents: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }

    /// Lowercased extension of the file name, if any.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        (!stem.is_empty() && !ext.is_empty()).then(|| ext.to_ascii_lowercase())
    }

    /// Reject anything that is not a spreadsheet file by extension.
    pub fn check_format(&self) -> Result<(), SurfaceError> {
        match self.extension() {
            Some(ext) if IMPORT_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
            _ => Err(SurfaceError::UnsupportedFormat(self.name.clone())),
        }
    }
}

/// The embedded grid editor.
///
/// The surface owns the document; the controller only snapshots it or
/// replaces it wholesale.
#[allow(async_fn_in_trait)]
#[cfg_attr(
    not(all(target_family = "wasm", target_os = "unknown")),
    trait_variant::make(Send)
)]
pub trait EditingSurface {
    /// Snapshot of the current grid content.
    fn current_document(&self) -> Document;

    /// Replace the grid content entirely.
    fn replace_document(&self, document: Document);

    /// Load a spreadsheet file into the grid.
    async fn import_from(&self, file: &ImportFile) -> Result<(), SurfaceError>;

    /// Hand the current grid to the user as a spreadsheet file.
    async fn export_current(&self) -> Result<(), SurfaceError>;
}

/// Router the controller asks to change the visible URL.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &Route);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    /// Something went wrong but the user can carry on.
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

/// Where outcomes are shown to the user. Fire and forget.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);

    fn success(&self, message: String) {
        self.notify(Notification {
            level: NotificationLevel::Success,
            message,
        });
    }

    fn warning(&self, message: String) {
        self.notify(Notification {
            level: NotificationLevel::Warning,
            message,
        });
    }

    fn error(&self, message: String) {
        self.notify(Notification {
            level: NotificationLevel::Error,
            message,
        });
    }
}

/// Navigator that ignores every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, route: &Route) {
        tracing::trace!(%route, "navigation ignored");
    }
}

/// Sink that forwards notifications to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => tracing::info!("{}", notification.message),
            NotificationLevel::Warning => tracing::warn!("{}", notification.message),
            NotificationLevel::Error => tracing::error!("{}", notification.message),
        }
    }
}
