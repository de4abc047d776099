//! `StateStore` backed by the Kubernetes API.

use super::{StateStore, StoreError};
use crate::crd::{AppVersion, EvaluationDefinition, EvaluationProvider, Task, WorkloadInstance};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn get_opt<K>(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Debug,
        <K as Resource>::DynamicType: Default,
    {
        Ok(self.api::<K>(namespace).get_opt(name).await?)
    }
}

#[async_trait]
impl StateStore for KubeStore {
    async fn get_app_version(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<AppVersion>, StoreError> {
        self.get_opt(namespace, name).await
    }

    async fn list_app_versions(&self, namespace: &str) -> Result<Vec<AppVersion>, StoreError> {
        let list = self
            .api::<AppVersion>(namespace)
            .list(&ListParams::default())
            .await?;
        Ok(list.items)
    }

    async fn update_app_version_status(&self, app: &AppVersion) -> Result<AppVersion, StoreError> {
        let name = app.name();
        let patch = app.status_patch()?;
        debug!(
            "Patching status of {}/{} at resourceVersion {:?}",
            app.namespace(),
            name,
            app.metadata.resource_version
        );

        match self
            .api::<AppVersion>(app.namespace())
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
        {
            Ok(updated) => Ok(updated),
            Err(kube::Error::Api(api_err)) if api_err.code == 409 => {
                Err(StoreError::Conflict(format!("{}/{}", app.namespace(), name)))
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                Err(StoreError::NotFound(format!("{}/{}", app.namespace(), name)))
            }
            Err(e) => Err(StoreError::Kube(e)),
        }
    }

    async fn get_task(&self, namespace: &str, name: &str) -> Result<Option<Task>, StoreError> {
        self.get_opt(namespace, name).await
    }

    async fn create_task(&self, task: &Task) -> Result<(), StoreError> {
        let namespace = task.metadata.namespace.as_deref().unwrap_or("default");
        let name = task.metadata.name.clone().unwrap_or_default();
        match self
            .api::<Task>(namespace)
            .create(&PostParams::default(), task)
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 409 => {
                Err(StoreError::AlreadyExists(format!("{namespace}/{name}")))
            }
            Err(e) => Err(StoreError::Kube(e)),
        }
    }

    async fn get_workload_instance(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<WorkloadInstance>, StoreError> {
        self.get_opt(namespace, name).await
    }

    async fn get_evaluation_definition(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<EvaluationDefinition>, StoreError> {
        self.get_opt(namespace, name).await
    }

    async fn get_evaluation_provider(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<EvaluationProvider>, StoreError> {
        self.get_opt(namespace, name).await
    }

    async fn get_secret_value(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<Option<String>, StoreError> {
        let secret: Option<Secret> = self.get_opt(namespace, name).await?;
        Ok(secret
            .and_then(|s| s.data)
            .and_then(|data| data.get(key).cloned())
            .map(|value| String::from_utf8_lossy(&value.0).trim().to_string()))
    }
}
