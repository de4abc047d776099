//! # Provider Modules
//!
//! Metrics backends queried by the evaluation engine.
//!
//! Every backend implements [`QueryProvider`]: run one query against a target
//! server and reduce the answer to a single scalar rendered as text. The set of
//! backends is closed and selected by name through [`MetricsProvider::from_name`].

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

// Common utilities shared across providers
pub mod common;

// Provider implementations
pub mod dynatrace;
pub mod prometheus;

pub use dynatrace::DynatraceProvider;
pub use prometheus::PrometheusProvider;

/// Errors returned by metrics providers
///
/// All of them are definition-level: the evaluation engine turns them into a
/// failed verdict carrying the message.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider {0} not supported")]
    Unsupported(String),
    #[error("missing credentials for provider {0}")]
    MissingCredentials(String),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} returned HTTP {status}: {body}")]
    Http {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("could not decode {provider} response: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },
    #[error("{0}")]
    Query(String),
    #[error("could not cast result")]
    UnexpectedResultType(String),
    #[error("no values")]
    NoValues,
    #[error("too many values")]
    TooManyValues,
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Credential used to authenticate against a provider
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Provider trait for metrics backends
#[async_trait]
pub trait QueryProvider: Send + Sync {
    /// Lowercase provider key, used in logs and metric labels
    fn name(&self) -> &'static str;

    /// Run `query` against `target_server` and return the resulting scalar
    async fn evaluate_query(
        &self,
        query: &str,
        target_server: &str,
        credentials: Option<&Credentials>,
    ) -> Result<String, ProviderError>;
}

/// Shared settings for building providers
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub http: reqwest::Client,
    /// Relative timeframe passed as `from` to Dynatrace
    pub dynatrace_window: String,
}

impl ProviderSettings {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration, dynatrace_window: impl Into<String>) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProviderError::Client)?;
        Ok(Self {
            http,
            dynatrace_window: dynatrace_window.into(),
        })
    }
}

/// The closed set of supported backends
#[derive(Debug, Clone)]
pub enum MetricsProvider {
    Prometheus(PrometheusProvider),
    Dynatrace(DynatraceProvider),
}

impl MetricsProvider {
    /// Build a provider from its case-insensitive name
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Unsupported`] for unknown names.
    pub fn from_name(name: &str, settings: &ProviderSettings) -> Result<Self, ProviderError> {
        match name.trim().to_ascii_lowercase().as_str() {
            prometheus::PROVIDER_NAME => Ok(Self::Prometheus(PrometheusProvider::new(
                settings.http.clone(),
            ))),
            dynatrace::PROVIDER_NAME => Ok(Self::Dynatrace(DynatraceProvider::new(
                settings.http.clone(),
                settings.dynatrace_window.clone(),
            ))),
            _ => Err(ProviderError::Unsupported(name.to_string())),
        }
    }
}

#[async_trait]
impl QueryProvider for MetricsProvider {
    fn name(&self) -> &'static str {
        match self {
            Self::Prometheus(p) => p.name(),
            Self::Dynatrace(p) => p.name(),
        }
    }

    async fn evaluate_query(
        &self,
        query: &str,
        target_server: &str,
        credentials: Option<&Credentials>,
    ) -> Result<String, ProviderError> {
        match self {
            Self::Prometheus(p) => p.evaluate_query(query, target_server, credentials).await,
            Self::Dynatrace(p) => p.evaluate_query(query, target_server, credentials).await,
        }
    }
}
