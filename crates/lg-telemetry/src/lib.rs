//! # LG Telemetry
//!
//! Logging, tracing and Prometheus metrics for the bridge.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lg_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! let _guard = init_telemetry(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LG_LOG_LEVEL` / `RUST_LOG` | `info` | `EnvFilter` directive |
//! | `LG_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `LG_CONSOLE_OUTPUT` | `true` | write logs to stdout |
//! | `LG_METRICS_PORT` | unset | serve `GET /metrics` |
//! | `OTEL_SERVICE_NAME` | `lg-bridge` | service name in logs and traces |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | unset | OTLP collector (feature `otlp`) |

#![warn(clippy::all)]

mod config;
pub mod metrics;
mod tracing_setup;

pub use config::{TelemetryConfig, DEFAULT_SERVICE_NAME};
pub use metrics::{encode_metrics, register_metrics, RunTimer};
pub use tracing_setup::{init_tracing, TracingGuard};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Register metrics, then install the global subscriber.
///
/// Hold the returned guard for the lifetime of the process; dropping it
/// flushes pending spans.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    let tracing = init_tracing(config)?;
    Ok(TelemetryGuard { _tracing: tracing })
}

/// Guard that keeps telemetry active. Drop to flush and shutdown.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
