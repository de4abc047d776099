//! # Evaluation Definitions and Providers
//!
//! `KeptnEvaluationDefinition` holds the objectives checked during the
//! evaluation phases. `KeptnEvaluationProvider` tells the controller where a
//! metrics backend lives and which secret holds its credentials.

use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// A set of metric objectives that must all hold
///
/// # Example
///
/// ```yaml
/// apiVersion: lifecycle.keptn.sh/v1alpha2
/// kind: KeptnEvaluationDefinition
/// metadata:
///   name: app-pre-deploy-eval
/// spec:
///   source: prometheus
///   objectives:
///     - name: available-cpus
///       query: "sum(kube_node_status_capacity{resource='cpu'})"
///       evaluationTarget: ">1"
/// ```
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "KeptnEvaluationDefinition",
    group = "lifecycle.keptn.sh",
    version = "v1alpha2",
    namespaced,
    shortname = "ked"
)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationDefinitionSpec {
    /// Default provider for objectives that do not name one
    pub source: String,
    #[serde(default)]
    pub objectives: Vec<Objective>,
    /// Extra attempts after a failed evaluation
    #[serde(default)]
    pub retries: u32,
    #[serde(default = "default_retry_interval")]
    pub retry_interval: String,
}

pub type EvaluationDefinition = KeptnEvaluationDefinition;

#[must_use]
pub fn default_retry_interval() -> String {
    "5s".to_string()
}

/// One metric query and the threshold it must meet
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Objective {
    pub name: String,
    pub query: String,
    /// `>` or `<` followed by a number, e.g. `<80`
    pub evaluation_target: String,
    /// Overrides the definition's `source`
    #[serde(default)]
    pub provider: Option<String>,
}

impl KeptnEvaluationDefinition {
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("unknown")
    }

    /// Provider name used for an objective
    #[must_use]
    pub fn provider_for<'a>(&'a self, objective: &'a Objective) -> &'a str {
        objective
            .provider
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&self.spec.source)
    }
}

/// Location and credentials of a metrics backend; the resource name is the provider key
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "KeptnEvaluationProvider",
    group = "lifecycle.keptn.sh",
    version = "v1alpha2",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationProviderSpec {
    pub target_server: String,
    #[serde(default)]
    pub secret_key_ref: Option<SecretKeyRef>,
}

pub type EvaluationProvider = KeptnEvaluationProvider;

/// Reference to one key of a Kubernetes Secret in the provider's namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct SecretKeyRef {
    pub name: String,
    pub key: String,
}

impl KeptnEvaluationProvider {
    /// True when a secret reference is present and both of its fields are non-blank
    #[must_use]
    pub fn has_secret_defined(&self) -> bool {
        self.spec
            .secret_key_ref
            .as_ref()
            .is_some_and(|r| !r.name.trim().is_empty() && !r.key.trim().is_empty())
    }
}
