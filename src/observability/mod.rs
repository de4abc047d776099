//! # Observability
//!
//! Observability modules for metrics and tracing.
//!
//! - `metrics`: Prometheus metrics collection
//! - `otel`: OpenTelemetry tracing integration

pub mod metrics;
pub mod otel;

// Re-export for convenience
pub use metrics::ControllerMetrics;
pub use otel::{init_otel, init_tracing, shutdown_otel, TracerProviderHandle};
