//! # Task
//!
//! A single pre- or post-deployment task. The controller only creates tasks
//! and reads their state; executing them is the job of the task runner.

use super::state::{CheckType, LifecycleState};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "KeptnTask",
    group = "lifecycle.keptn.sh",
    version = "v1alpha2",
    namespaced,
    status = "TaskStatus",
    printcolumn = r#"{"name":"AppName", "type":"string", "jsonPath":".spec.appName"}, {"name":"Definition", "type":"string", "jsonPath":".spec.taskDefinition"}, {"name":"Status", "type":"string", "jsonPath":".status.status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    pub app_name: String,
    pub app_version: String,
    /// Name of the task definition to run
    pub task_definition: String,
    pub check_type: CheckType,
}

pub type Task = KeptnTask;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    #[serde(default)]
    pub status: LifecycleState,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

impl KeptnTask {
    /// State written by the task runner; `Pending` until it reports
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.status.as_ref().map(|s| s.status).unwrap_or_default()
    }
}
