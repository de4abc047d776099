//! # OpenTelemetry Support
//!
//! Sets up the OTLP trace exporter, the global tracer provider and the
//! `tracing` subscriber bridged to it.
//!
//! The exporter endpoint follows the standard `OTEL_EXPORTER_OTLP_ENDPOINT`
//! variable. With tracing disabled, only the log subscriber is installed and
//! the global tracer stays a no-op, so phase spans cost nothing.

use crate::config::{ControllerConfig, LogFormat};
use anyhow::{Context, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Tracer provider handle for graceful shutdown
#[derive(Debug)]
pub struct TracerProviderHandle(SdkTracerProvider);

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| "lifecycle_controller=info".into())
}

/// Build the OTLP tracer provider and install it globally
///
/// Returns `Ok(None)` when tracing is disabled. The exporter uses a blocking
/// HTTP client, so call this before the async runtime starts.
///
/// # Errors
///
/// Returns an error if the exporter cannot be built.
pub fn init_otel(config: &ControllerConfig) -> Result<Option<TracerProviderHandle>> {
    if !config.enable_tracing {
        return Ok(None);
    }

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .build()
        .context("Failed to build OTLP span exporter")?;

    let provider = SdkTracerProvider::builder()
        .with_resource(
            Resource::builder()
                .with_service_name(config.otel_service_name.clone())
                .build(),
        )
        .with_batch_exporter(exporter)
        .build();

    opentelemetry::global::set_tracer_provider(provider.clone());

    Ok(Some(TracerProviderHandle(provider)))
}

/// Install the `tracing` subscriber
///
/// When a tracer provider is given, `tracing` spans are also exported through it.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(config: &ControllerConfig, provider: Option<&TracerProviderHandle>) -> Result<()> {
    let otel_layer = provider.map(|handle| {
        tracing_opentelemetry::layer().with_tracer(handle.0.tracer(config.otel_service_name.clone()))
    });

    let registry = tracing_subscriber::registry()
        .with(env_filter())
        .with(otel_layer);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("Failed to install tracing subscriber")?,
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .context("Failed to install tracing subscriber")?,
    }

    if provider.is_some() {
        info!(
            "✅ OpenTelemetry tracing initialized for service {}",
            config.otel_service_name
        );
    }
    Ok(())
}

/// Shutdown OpenTelemetry tracer provider gracefully
///
/// Flushes pending spans and shuts down the tracer provider.
pub fn shutdown_otel(tracer_provider: Option<TracerProviderHandle>) {
    if let Some(TracerProviderHandle(provider)) = tracer_provider {
        info!("Shutting down OpenTelemetry tracer provider...");
        if let Err(e) = provider.shutdown() {
            warn!("Error shutting down tracer provider: {}", e);
        } else {
            info!("✅ Tracer provider shut down successfully");
        }
    }
}
