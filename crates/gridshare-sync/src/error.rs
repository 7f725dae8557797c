//! Error types for sync operations.

use gridshare_common::StoreError;
use miette::Diagnostic;
use smol_str::SmolStr;

use crate::state::Operation;

/// Errors raised by the editing surface.
#[derive(Debug, Clone, thiserror::Error, Diagnostic)]
#[non_exhaustive]
pub enum SurfaceError {
    /// The file is not a spreadsheet format the surface can import.
    #[error("unsupported file type: {0}")]
    #[diagnostic(
        code(gridshare::surface::format),
        help("only .xlsx and .xls files can be imported")
    )]
    UnsupportedFormat(SmolStr),

    #[error("import failed: {0}")]
    #[diagnostic(code(gridshare::surface::import))]
    Import(String),

    #[error("export failed: {0}")]
    #[diagnostic(code(gridshare::surface::export))]
    Export(String),

    /// An error the surface raised on its own.
    #[error("{0}")]
    #[diagnostic(code(gridshare::surface::internal))]
    Internal(String),
}

/// Errors that can occur during sync operations.
#[derive(Debug, thiserror::Error, Diagnostic)]
#[non_exhaustive]
pub enum SyncError {
    /// The editing surface never became ready.
    #[error("editing surface is not ready")]
    #[diagnostic(code(gridshare::sync::not_ready))]
    NotReady,

    /// Loading a shared document failed; the blank template was used instead.
    #[error("could not load shared spreadsheet {id}")]
    #[diagnostic(code(gridshare::sync::load))]
    Load {
        id: SmolStr,
        #[source]
        #[diagnostic_source]
        source: StoreError,
    },

    /// A create, update or delete call failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    /// An operation was requested while another was in flight.
    #[error("{requested} rejected while {in_flight} is in progress")]
    #[diagnostic(code(gridshare::sync::busy))]
    ReentrancyRejected {
        requested: Operation,
        in_flight: Operation,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Surface(#[from] SurfaceError),
}
