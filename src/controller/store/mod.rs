//! # State Store
//!
//! Typed access to the namespaced objects the controller reads and writes.
//!
//! Objects are addressed by `(namespace, name)`. A missing object is `Ok(None)`,
//! never an error. Status writes use optimistic concurrency: a write based on a
//! stale `resourceVersion` fails with [`StoreError::Conflict`].

mod kubernetes;

pub use kubernetes::KubeStore;

use crate::crd::{AppVersion, EvaluationDefinition, EvaluationProvider, Task, WorkloadInstance};
use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by the state store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflict writing {0}: object was modified")]
    Conflict(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_app_version(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<AppVersion>, StoreError>;

    async fn list_app_versions(&self, namespace: &str) -> Result<Vec<AppVersion>, StoreError>;

    /// Write the whole status of `app`, guarded by its `resourceVersion`
    ///
    /// Returns the stored object carrying the new `resourceVersion`.
    async fn update_app_version_status(&self, app: &AppVersion) -> Result<AppVersion, StoreError>;

    async fn get_task(&self, namespace: &str, name: &str) -> Result<Option<Task>, StoreError>;

    /// Create a task; an existing task of the same name is [`StoreError::AlreadyExists`]
    async fn create_task(&self, task: &Task) -> Result<(), StoreError>;

    async fn get_workload_instance(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<WorkloadInstance>, StoreError>;

    async fn get_evaluation_definition(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<EvaluationDefinition>, StoreError>;

    async fn get_evaluation_provider(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<EvaluationProvider>, StoreError>;

    /// Value of one key of a Secret, `None` if the secret or the key is missing
    async fn get_secret_value(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<Option<String>, StoreError>;
}
