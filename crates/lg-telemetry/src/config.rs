//! Telemetry configuration from environment variables.

use std::env;

pub const DEFAULT_SERVICE_NAME: &str = "lg-bridge";

/// Configuration for logging, tracing and metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name for traces and logs
    pub service_name: String,

    /// Log filter directive (`info`, `lg_03_outbox=debug,info`, ...)
    pub log_level: String,

    /// Whether to write logs to stdout
    pub console_output: bool,

    /// JSON formatted logs instead of the pretty format
    pub json_logs: bool,

    /// Port for `GET /metrics`; `None` disables the endpoint
    pub metrics_port: Option<u16>,

    /// OTLP endpoint; only used with the `otlp` feature
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            metrics_port: None,
            otlp_endpoint: None,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OTEL_SERVICE_NAME`: Service name (default: lg-bridge)
    /// - `LG_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `LG_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `LG_JSON_LOGS`: Enable JSON logs (default: true in containers)
    /// - `LG_METRICS_PORT`: Prometheus metrics port (default: disabled)
    /// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP collector (default: none)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();
        let defaults = Self::default();

        Self {
            service_name: non_empty(lookup("OTEL_SERVICE_NAME"))
                .unwrap_or(defaults.service_name),

            log_level: non_empty(lookup("LG_LOG_LEVEL"))
                .or_else(|| non_empty(lookup("RUST_LOG")))
                .unwrap_or(defaults.log_level),

            console_output: lookup("LG_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: lookup("LG_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            metrics_port: lookup("LG_METRICS_PORT")
                .and_then(|v| v.trim().parse().ok())
                .filter(|port| *port != 0),

            otlp_endpoint: non_empty(lookup("OTEL_EXPORTER_OTLP_ENDPOINT")),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
