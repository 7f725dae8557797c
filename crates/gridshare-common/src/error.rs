//! Error types shared across gridshare crates.

use miette::Diagnostic;
use smol_str::SmolStr;

/// Which store operation produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Create,
    Read,
    Update,
    Delete,
}

impl std::fmt::Display for StoreOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StoreOp::Create => "create",
            StoreOp::Read => "read",
            StoreOp::Update => "update",
            StoreOp::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Broad classification of a store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The service answered 404 for the identifier.
    NotFound,
    /// Transport failure or any other non-success status.
    Unavailable,
    /// A create response did not say where the new blob lives.
    MissingLocation,
    /// The body could not be encoded or decoded as JSON.
    Decode,
}

/// Failure of a single remote store call.
#[derive(Debug, thiserror::Error, Diagnostic)]
#[diagnostic(code(gridshare::store))]
pub enum StoreError {
    #[error("{op} failed: blob {id} not found")]
    NotFound { op: StoreOp, id: SmolStr },

    #[error("{op} failed with status {status}")]
    Status { op: StoreOp, status: http::StatusCode },

    #[error("{op} failed: could not reach the blob service")]
    Transport {
        op: StoreOp,
        #[source]
        source: reqwest::Error,
    },

    #[error("create succeeded but the response carried no usable Location header")]
    #[diagnostic(help("the blob service must answer POST with a Location ending in the blob id"))]
    MissingLocation,

    #[error("{op} failed: invalid JSON payload")]
    Decode {
        op: StoreOp,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid blob identifier: {0:?}")]
    InvalidIdentifier(SmolStr),
}

impl StoreError {
    pub fn kind(&self) -> StoreErrorKind {
        match self {
            StoreError::NotFound { .. } => StoreErrorKind::NotFound,
            StoreError::Status { .. } | StoreError::Transport { .. } => {
                StoreErrorKind::Unavailable
            }
            StoreError::InvalidIdentifier(_) => StoreErrorKind::NotFound,
            StoreError::MissingLocation => StoreErrorKind::MissingLocation,
            StoreError::Decode { .. } => StoreErrorKind::Decode,
        }
    }

    /// The operation that failed, when known.
    pub fn op(&self) -> Option<StoreOp> {
        match self {
            StoreError::NotFound { op, .. }
            | StoreError::Status { op, .. }
            | StoreError::Transport { op, .. }
            | StoreError::Decode { op, .. } => Some(*op),
            StoreError::MissingLocation => Some(StoreOp::Create),
            StoreError::InvalidIdentifier(_) => None,
        }
    }
}

/// Configuration loading and saving errors.
#[derive(Debug, thiserror::Error, Diagnostic)]
#[diagnostic(code(gridshare::config))]
pub enum ConfigError {
    #[error("failed to read or write config file")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON")]
    Json(#[from] serde_json::Error),

    #[error("unsupported config format: {0}")]
    #[diagnostic(help("only .json config files are supported"))]
    UnsupportedFormat(String),

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid URL {0:?}")]
    InvalidUrl(String),
}
