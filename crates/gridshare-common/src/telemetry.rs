//! Telemetry setup for gridshare hosts.
//!
//! Provides:
//! - Tracing with compact console output, filtered by `RUST_LOG`
//! - Prometheus metrics for blob store calls
//!
//! # Usage
//!
//! ```ignore
//! use gridshare_common::telemetry::{self, TelemetryConfig};
//!
//! telemetry::init(TelemetryConfig::from_env("gridshare"));
//! tracing::info!("started");
//! println!("{}", telemetry::render());
//! ```

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::StoreOp;

static PROMETHEUS_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event.
    pub service_name: String,
    /// Console log level (default: INFO, DEBUG in debug builds)
    pub console_level: Level,
}

impl TelemetryConfig {
    /// `RUST_LOG` overrides `console_level` when set.
    pub fn from_env(service_name: impl Into<String>) -> Self {
        let console_level = if cfg!(debug_assertions) {
            Level::DEBUG
        } else {
            Level::INFO
        };

        Self {
            service_name: service_name.into(),
            console_level,
        }
    }
}

/// Initialize metrics and tracing. Call once at startup.
pub fn init(config: TelemetryConfig) {
    init_metrics();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.console_level.as_str().to_lowercase()));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(env_filter);

    if tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed");
        return;
    }

    tracing::debug!(service = %config.service_name, "telemetry initialized");
}

/// Install the prometheus recorder. Returns `None` if another recorder won.
pub fn init_metrics() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE
        .get_or_init(|| PrometheusBuilder::new().install_recorder().ok())
        .as_ref()
}

/// Render metrics in prometheus text format.
pub fn render() -> String {
    init_metrics().map(PrometheusHandle::render).unwrap_or_default()
}

pub(crate) fn record_store_call(op: StoreOp, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    metrics::counter!("gridshare_store_requests_total", "op" => op.to_string(), "outcome" => outcome)
        .increment(1);
}

pub use metrics::{counter, gauge, histogram};
