//! # WorkloadInstance
//!
//! Read-only view of a workload rollout, maintained by the workload controller.

use super::state::LifecycleState;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "KeptnWorkloadInstance",
    group = "lifecycle.keptn.sh",
    version = "v1alpha2",
    namespaced,
    status = "WorkloadInstanceStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadInstanceSpec {
    pub app: String,
    pub workload_name: String,
    pub version: String,
}

pub type WorkloadInstance = KeptnWorkloadInstance;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadInstanceStatus {
    #[serde(default)]
    pub status: LifecycleState,
}

impl KeptnWorkloadInstance {
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.status.as_ref().map(|s| s.status).unwrap_or_default()
    }
}
