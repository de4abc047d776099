//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" | "pretty" => Ok(Self::Text),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Requeue interval while a phase is in progress (seconds)
    pub phase_requeue_secs: u64,
    /// Requeue delay after a status write conflict (milliseconds)
    pub conflict_requeue_millis: u64,
    /// Fibonacci backoff lower bound (minutes)
    pub backoff_min_minutes: u64,
    /// Fibonacci backoff upper bound (minutes)
    pub backoff_max_minutes: u64,
    /// Port of the metrics and probe server
    pub metrics_port: u16,
    /// HTTP server startup timeout (seconds)
    pub server_startup_timeout_secs: u64,
    /// HTTP server readiness poll interval (milliseconds)
    pub server_poll_interval_ms: u64,
    /// Limits how many app versions can be reconciled simultaneously
    pub max_concurrent_reconciliations: u16,
    pub log_format: LogFormat,
    /// Export spans over OTLP
    pub enable_tracing: bool,
    pub otel_service_name: String,
    /// Relative timeframe for Dynatrace queries, e.g. `now-2h`
    pub dynatrace_query_window: String,
    /// Timeout for metrics provider requests (seconds)
    pub provider_http_timeout_secs: u64,
    /// Namespace to watch; all namespaces when `None`
    pub watch_namespace: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            phase_requeue_secs: DEFAULT_PHASE_REQUEUE_SECS,
            conflict_requeue_millis: DEFAULT_CONFLICT_REQUEUE_MILLIS,
            backoff_min_minutes: DEFAULT_BACKOFF_MIN_MINUTES,
            backoff_max_minutes: DEFAULT_BACKOFF_MAX_MINUTES,
            metrics_port: DEFAULT_METRICS_PORT,
            server_startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            server_poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            log_format: LogFormat::Text,
            enable_tracing: true,
            otel_service_name: DEFAULT_OTEL_SERVICE_NAME.to_string(),
            dynatrace_query_window: DEFAULT_DYNATRACE_QUERY_WINDOW.to_string(),
            provider_http_timeout_secs: DEFAULT_PROVIDER_HTTP_TIMEOUT_SECS,
            watch_namespace: None,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            phase_requeue_secs: env_var_or_default(
                "PHASE_REQUEUE_SECS",
                DEFAULT_PHASE_REQUEUE_SECS,
            ),
            conflict_requeue_millis: env_var_or_default(
                "CONFLICT_REQUEUE_MILLIS",
                DEFAULT_CONFLICT_REQUEUE_MILLIS,
            ),
            backoff_min_minutes: env_var_or_default(
                "BACKOFF_MIN_MINUTES",
                DEFAULT_BACKOFF_MIN_MINUTES,
            ),
            backoff_max_minutes: env_var_or_default(
                "BACKOFF_MAX_MINUTES",
                DEFAULT_BACKOFF_MAX_MINUTES,
            ),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            server_startup_timeout_secs: env_var_or_default(
                "SERVER_STARTUP_TIMEOUT_SECS",
                DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            ),
            server_poll_interval_ms: env_var_or_default(
                "SERVER_POLL_INTERVAL_MS",
                DEFAULT_SERVER_POLL_INTERVAL_MS,
            ),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            log_format: env_var_or_default("LOG_FORMAT", LogFormat::Text),
            enable_tracing: env_var_or_default_bool("ENABLE_TRACING", true),
            otel_service_name: env_var_or_default_str(
                "OTEL_SERVICE_NAME",
                DEFAULT_OTEL_SERVICE_NAME,
            ),
            dynatrace_query_window: env_var_or_default_str(
                "DYNATRACE_QUERY_WINDOW",
                DEFAULT_DYNATRACE_QUERY_WINDOW,
            ),
            provider_http_timeout_secs: env_var_or_default(
                "PROVIDER_HTTP_TIMEOUT_SECS",
                DEFAULT_PROVIDER_HTTP_TIMEOUT_SECS,
            ),
            watch_namespace: std::env::var("WATCH_NAMESPACE")
                .ok()
                .filter(|ns| !ns.trim().is_empty()),
        }
    }

    /// Get phase requeue duration
    #[must_use]
    pub fn phase_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.phase_requeue_secs)
    }

    /// Get conflict requeue duration
    #[must_use]
    pub fn conflict_requeue_duration(&self) -> Duration {
        Duration::from_millis(self.conflict_requeue_millis)
    }

    /// Get provider HTTP timeout
    #[must_use]
    pub fn provider_http_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_http_timeout_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
