//! Shared plumbing for gridshare: configuration, errors and the blob store client.

pub mod config;
pub mod error;
pub mod store;
#[cfg(feature = "telemetry")]
pub mod telemetry;

pub use crate::config::{Config, FileStore, Loader, Saver};
pub use crate::error::{ConfigError, StoreError, StoreErrorKind, StoreOp};
pub use crate::store::{BlobStore, JsonBlobClient, identifier_from_location, is_valid_identifier};

pub use reqwest::Url;
pub use smol_str::SmolStr;
