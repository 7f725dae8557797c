//! Client for the jsonBlob key-value service.
//!
//! The wire contract is small:
//! - `POST {base}/jsonBlob` with a JSON body answers with a `Location` header
//!   whose last path segment is the new blob id
//! - `GET`, `PUT` and `DELETE {base}/jsonBlob/{id}` answer 2xx or fail
//!
//! No structured error body is assumed. Every call is a single attempt: retry
//! and backoff belong to callers, and none of them implement it.

use http::StatusCode;
use http::header::{ACCEPT, LOCATION};
use reqwest::Url;
use serde_json::Value;
use smol_str::SmolStr;

use crate::config::Config;
use crate::error::{ConfigError, StoreError, StoreOp};

/// Create/read/update/delete against a remote blob store.
///
/// On native targets the returned futures are `Send` so callers can drive them
/// from spawned tasks. In the browser they run on the local executor.
#[allow(async_fn_in_trait)]
#[cfg_attr(
    not(all(target_family = "wasm", target_os = "unknown")),
    trait_variant::make(Send)
)]
pub trait BlobStore {
    /// Store a new blob and return its identifier.
    async fn create(&self, document: &Value) -> Result<SmolStr, StoreError>;

    /// Fetch the blob stored under `id`.
    async fn read(&self, id: &str) -> Result<Value, StoreError>;

    /// Replace the blob stored under `id`.
    async fn update(&self, id: &str, document: &Value) -> Result<(), StoreError>;

    /// Remove the blob stored under `id`.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// HTTP client for a jsonBlob-compatible service.
#[derive(Clone, Debug)]
pub struct JsonBlobClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl JsonBlobClient {
    /// Client with default reqwest settings against `endpoint`
    /// (the `/jsonBlob` collection URL).
    pub fn new(endpoint: Url) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    /// Client configured from [`Config`]: endpoint, user agent and timeout.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let endpoint = config.blob_endpoint()?;

        #[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()
            .map_err(|_| ConfigError::InvalidUrl(config.store_url.clone()))?;
        #[cfg(all(target_family = "wasm", target_os = "unknown"))]
        let client = reqwest::Client::new();

        Ok(Self::with_client(client, endpoint))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn blob_url(&self, id: &str) -> Result<Url, StoreError> {
        if !is_valid_identifier(id) {
            return Err(StoreError::InvalidIdentifier(id.into()));
        }
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidIdentifier(id.into()))?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }
}

/// Identifiers are single opaque path segments.
pub fn is_valid_identifier(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && id != "."
        && id != ".."
}

/// Extract the blob id from a `Location` header value.
///
/// Accepts absolute and relative locations; query and fragment are ignored.
pub fn identifier_from_location(location: &str) -> Option<SmolStr> {
    let path = location
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');
    let id = path.rsplit('/').next()?;
    is_valid_identifier(id).then(|| SmolStr::new(id))
}

fn check_status(op: StoreOp, id: Option<&str>, status: StatusCode) -> Result<(), StoreError> {
    if status.is_success() {
        return Ok(());
    }
    match (status, id) {
        (StatusCode::NOT_FOUND, Some(id)) => Err(StoreError::NotFound {
            op,
            id: id.into(),
        }),
        _ => Err(StoreError::Status { op, status }),
    }
}

fn transport(op: StoreOp) -> impl FnOnce(reqwest::Error) -> StoreError {
    move |source| StoreError::Transport { op, source }
}

fn record<T>(op: StoreOp, result: Result<T, StoreError>) -> Result<T, StoreError> {
    match &result {
        Ok(_) => tracing::debug!(%op, "blob store call succeeded"),
        Err(e) => tracing::warn!(%op, error = %e, "blob store call failed"),
    }
    #[cfg(feature = "telemetry")]
    crate::telemetry::record_store_call(op, result.is_ok());
    result
}

impl BlobStore for JsonBlobClient {
    async fn create(&self, document: &Value) -> Result<SmolStr, StoreError> {
        let op = StoreOp::Create;
        let result = async {
            let response = self
                .client
                .post(self.endpoint.clone())
                .header(ACCEPT, "application/json")
                .json(document)
                .send()
                .await
                .map_err(transport(op))?;
            check_status(op, None, response.status())?;

            response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .and_then(identifier_from_location)
                .ok_or(StoreError::MissingLocation)
        }
        .await;
        record(op, result)
    }

    async fn read(&self, id: &str) -> Result<Value, StoreError> {
        let op = StoreOp::Read;
        let result = async {
            let url = self.blob_url(id)?;
            let response = self
                .client
                .get(url)
                .header(ACCEPT, "application/json")
                .send()
                .await
                .map_err(transport(op))?;
            check_status(op, Some(id), response.status())?;

            let body = response.bytes().await.map_err(transport(op))?;
            serde_json::from_slice(&body).map_err(|source| StoreError::Decode { op, source })
        }
        .await;
        record(op, result)
    }

    async fn update(&self, id: &str, document: &Value) -> Result<(), StoreError> {
        let op = StoreOp::Update;
        let result = async {
            let url = self.blob_url(id)?;
            let response = self
                .client
                .put(url)
                .header(ACCEPT, "application/json")
                .json(document)
                .send()
                .await
                .map_err(transport(op))?;
            check_status(op, Some(id), response.status())
        }
        .await;
        record(op, result)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let op = StoreOp::Delete;
        let result = async {
            let url = self.blob_url(id)?;
            let response = self
                .client
                .delete(url)
                .send()
                .await
                .map_err(transport(op))?;
            check_status(op, Some(id), response.status())
        }
        .await;
        record(op, result)
    }
}
