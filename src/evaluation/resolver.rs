//! # Provider Resolver
//!
//! Turns an objective's provider name into a ready-to-query backend: the
//! provider implementation, its target server and its credentials.

use crate::controller::store::{StateStore, StoreError};
use crate::provider::{Credentials, MetricsProvider, ProviderError, ProviderSettings, QueryProvider};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("evaluation provider {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Unsupported(#[from] ProviderError),
    #[error("missing credentials for provider {provider}: {reason}")]
    MissingCredentials { provider: String, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ResolveError {
    /// Store failures abort the invocation; everything else fails the objective
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// A backend ready to answer queries
#[derive(Clone)]
pub struct ResolvedProvider {
    pub provider: Arc<dyn QueryProvider>,
    pub target_server: String,
    pub credentials: Option<Credentials>,
}

impl std::fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("provider", &self.provider.name())
            .field("target_server", &self.target_server)
            .field("credentials", &self.credentials)
            .finish()
    }
}

#[async_trait]
pub trait ProviderResolver: Send + Sync {
    async fn resolve(&self, namespace: &str, provider: &str)
        -> Result<ResolvedProvider, ResolveError>;
}

/// Resolves providers from `KeptnEvaluationProvider` resources and their secrets
#[derive(Clone)]
pub struct KubeProviderResolver {
    store: Arc<dyn StateStore>,
    settings: ProviderSettings,
}

impl std::fmt::Debug for KubeProviderResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeProviderResolver")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl KubeProviderResolver {
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>, settings: ProviderSettings) -> Self {
        Self { store, settings }
    }
}

#[async_trait]
impl ProviderResolver for KubeProviderResolver {
    async fn resolve(
        &self,
        namespace: &str,
        provider: &str,
    ) -> Result<ResolvedProvider, ResolveError> {
        // Unknown names fail before any API call
        let backend = MetricsProvider::from_name(provider, &self.settings)?;
        let key = backend.name();

        let resource = self
            .store
            .get_evaluation_provider(namespace, key)
            .await?
            .ok_or_else(|| ResolveError::NotFound(format!("{namespace}/{key}")))?;

        let credentials = match resource.spec.secret_key_ref.as_ref() {
            Some(secret_ref) if resource.has_secret_defined() => {
                let name = secret_ref.name.trim();
                let secret_key = secret_ref.key.trim();
                let token = self
                    .store
                    .get_secret_value(namespace, name, secret_key)
                    .await?
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| ResolveError::MissingCredentials {
                        provider: key.to_string(),
                        reason: format!("secret {name} has no value for key {secret_key}"),
                    })?;
                Some(Credentials::new(token))
            }
            _ => None,
        };

        debug!(
            "Resolved provider {} in {} to {}",
            key, namespace, resource.spec.target_server
        );

        Ok(ResolvedProvider {
            provider: Arc::new(backend),
            target_server: resource.spec.target_server,
            credentials,
        })
    }
}
