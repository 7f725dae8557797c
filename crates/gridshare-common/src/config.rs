use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable overriding [`Config::store_url`].
pub const ENV_STORE_URL: &str = "GRIDSHARE_STORE_URL";
/// Environment variable overriding [`Config::share_url`].
pub const ENV_SHARE_URL: &str = "GRIDSHARE_SHARE_URL";
/// Environment variable overriding [`Config::autosave_secs`].
pub const ENV_AUTOSAVE_SECS: &str = "GRIDSHARE_AUTOSAVE_SECS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the blob service. `/jsonBlob` is appended to it.
    pub store_url: String,
    /// Base URL share links are built on.
    pub share_url: String,
    /// Autosave period in seconds while a document is bound. 0 disables autosave.
    pub autosave_secs: u64,
    /// Per-request timeout in seconds (native only).
    pub request_timeout_secs: u64,
    /// User agent sent with every store request.
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_url: "https://jsonblob.com/api".to_owned(),
            share_url: "http://localhost:3000".to_owned(),
            autosave_secs: 30,
            request_timeout_secs: 15,
            user_agent: concat!("gridshare/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl Config {
    /// Loads the configuration from the provided loader.
    pub async fn load(loader: &impl Loader) -> Result<Self, ConfigError> {
        loader.load().await
    }

    /// Saves the configuration using the provided saver.
    pub async fn save(&self, saver: &impl Saver) -> Result<(), ConfigError> {
        saver.save(self).await
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Apply `GRIDSHARE_*` environment overrides on top of this config.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(url) = lookup(ENV_STORE_URL) {
            self.store_url = url;
        }
        if let Some(url) = lookup(ENV_SHARE_URL) {
            self.share_url = url;
        }
        if let Some(secs) = lookup(ENV_AUTOSAVE_SECS) {
            self.autosave_secs = secs.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_AUTOSAVE_SECS,
                value: secs,
            })?;
        }
        Ok(self)
    }

    /// The `/jsonBlob` collection endpoint of the configured store.
    pub fn blob_endpoint(&self) -> Result<Url, ConfigError> {
        let base = self.store_url.trim_end_matches('/');
        Url::parse(&format!("{base}/jsonBlob"))
            .map_err(|_| ConfigError::InvalidUrl(self.store_url.clone()))
    }

    /// Absolute share link for a blob identifier.
    pub fn share_link(&self, id: &str) -> String {
        format!("{}/{}", self.share_url.trim_end_matches('/'), id)
    }

    /// Autosave period, or `None` when autosave is disabled.
    pub fn autosave_period(&self) -> Option<Duration> {
        (self.autosave_secs > 0).then(|| Duration::from_secs(self.autosave_secs))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// The trait for loading configuration data.
pub trait Loader {
    /// Loads the configuration data.
    fn load(&self) -> impl Future<Output = Result<Config, ConfigError>> + Send;
}

/// The trait for saving configuration data.
pub trait Saver {
    /// Saves the configuration data.
    fn save(&self, config: &Config) -> impl Future<Output = Result<(), ConfigError>> + Send;
}

/// An implementation of [`Loader`] and [`Saver`] that reads and writes a configuration file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a new [`FileStore`] with the given path.
    ///
    /// Only `.json` files are supported.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_format(&self) -> Result<(), ConfigError> {
        match self.path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(()),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or_default().to_owned(),
            )),
        }
    }
}

impl Loader for FileStore {
    async fn load(&self) -> Result<Config, ConfigError> {
        self.check_format()?;
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl Saver for FileStore {
    async fn save(&self, config: &Config) -> Result<(), ConfigError> {
        self.check_format()?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(config)?)?;
        Ok(())
    }
}
