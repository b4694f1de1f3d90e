//! Global `tracing` subscriber setup.
//!
//! `EnvFilter` + a pretty or JSON `fmt` layer, plus an OpenTelemetry layer
//! exporting over OTLP when built with the `otlp` feature and an endpoint
//! is configured.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Flushes and shuts down the trace exporter on drop.
#[derive(Default)]
pub struct TracingGuard {
    #[cfg(feature = "otlp")]
    provider: Option<opentelemetry_sdk::trace::TracerProvider>,
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        #[cfg(feature = "otlp")]
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("Error shutting down tracer provider: {:?}", e);
            }
        }
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(config: &TelemetryConfig) -> Result<TracingGuard, TelemetryError> {
    let env_filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(format!("log filter {:?}: {e}", config.log_level)))?;

    let json_layer = (config.console_output && config.json_logs).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });
    let pretty_layer = (config.console_output && !config.json_logs).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
    });

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer);

    install(registry, config)
}

#[cfg(feature = "otlp")]
fn install<S>(subscriber: S, config: &TelemetryConfig) -> Result<TracingGuard, TelemetryError>
where
    S: tracing::Subscriber
        + for<'span> tracing_subscriber::registry::LookupSpan<'span>
        + Send
        + Sync
        + 'static,
{
    let (otel_layer, provider) = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            let (layer, provider) = otlp::layer(config, endpoint)?;
            (Some(layer), Some(provider))
        }
        None => (None, None),
    };
    subscriber
        .with(otel_layer)
        .try_init()
        .map_err(|e| TelemetryError::TracerInit(e.to_string()))?;
    tracing::info!(
        service = %config.service_name,
        otlp_endpoint = ?config.otlp_endpoint,
        "Tracing initialized"
    );
    Ok(TracingGuard { provider })
}

#[cfg(not(feature = "otlp"))]
fn install<S>(subscriber: S, config: &TelemetryConfig) -> Result<TracingGuard, TelemetryError>
where
    S: Into<tracing::Dispatch>,
{
    subscriber
        .try_init()
        .map_err(|e| TelemetryError::TracerInit(e.to_string()))?;
    if config.otlp_endpoint.is_some() {
        tracing::warn!("OTEL_EXPORTER_OTLP_ENDPOINT set but built without the otlp feature");
    }
    tracing::info!(service = %config.service_name, "Tracing initialized");
    Ok(TracingGuard::default())
}

#[cfg(feature = "otlp")]
mod otlp {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{
        runtime,
        trace::{self, RandomIdGenerator, Sampler, TracerProvider},
        Resource,
    };
    use tracing_opentelemetry::OpenTelemetryLayer;

    use crate::{TelemetryConfig, TelemetryError};

    pub(super) fn layer<S>(
        config: &TelemetryConfig,
        endpoint: &str,
    ) -> Result<(OpenTelemetryLayer<S, opentelemetry_sdk::trace::Tracer>, TracerProvider), TelemetryError>
    where
        S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
    {
        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint);

        let provider = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(exporter)
            .with_trace_config(
                trace::Config::default()
                    .with_sampler(Sampler::AlwaysOn)
                    .with_id_generator(RandomIdGenerator::default())
                    .with_resource(Resource::new(vec![
                        KeyValue::new("service.name", config.service_name.clone()),
                        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                    ])),
            )
            .install_batch(runtime::Tokio)
            .map_err(|e| TelemetryError::TracerInit(e.to_string()))?;

        let tracer = provider.tracer(config.service_name.clone());
        Ok((tracing_opentelemetry::layer().with_tracer(tracer), provider))
    }
}
