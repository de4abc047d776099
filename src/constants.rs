//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Requeue interval while a phase is still in progress (seconds)
pub const DEFAULT_PHASE_REQUEUE_SECS: u64 = 5;

/// Requeue delay after a status write lost an optimistic-concurrency race (milliseconds)
pub const DEFAULT_CONFLICT_REQUEUE_MILLIS: u64 = 100;

/// Fibonacci backoff lower bound for failed reconciliations (minutes)
pub const DEFAULT_BACKOFF_MIN_MINUTES: u64 = 1;

/// Fibonacci backoff upper bound for failed reconciliations (minutes)
pub const DEFAULT_BACKOFF_MAX_MINUTES: u64 = 10;

/// Default maximum number of app versions reconciled at the same time
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Default OpenTelemetry service name
pub const DEFAULT_OTEL_SERVICE_NAME: &str = "lifecycle-controller";

/// Default relative timeframe for Dynatrace metric queries
pub const DEFAULT_DYNATRACE_QUERY_WINDOW: &str = "now-2h";

/// Default timeout for metrics provider HTTP requests (seconds)
pub const DEFAULT_PROVIDER_HTTP_TIMEOUT_SECS: u64 = 30;

/// Reporting controller name on published events
pub const EVENT_REPORTER: &str = "keptn-lifecycle-controller";
