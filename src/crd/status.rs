//! # AppVersion Status
//!
//! Status record owned by the orchestrator, plus the per-task, per-evaluation
//! and per-workload result records it accumulates.

use super::state::{LifecycleState, Phase};
use super::WorkloadRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Serialized trace context (W3C `traceparent`/`tracestate`)
pub type TraceCarrier = HashMap<String, String>;

/// Observed state of an `AppVersion`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppVersionStatus {
    #[serde(default)]
    pub pre_deployment_status: LifecycleState,
    #[serde(default)]
    pub pre_deployment_evaluation_status: LifecycleState,
    #[serde(default)]
    pub workload_overall_status: LifecycleState,
    #[serde(default)]
    pub post_deployment_status: LifecycleState,
    #[serde(default)]
    pub post_deployment_evaluation_status: LifecycleState,
    /// Overall state of the version
    #[serde(default)]
    pub status: LifecycleState,
    /// Long name of the phase currently being worked on
    #[serde(default)]
    pub current_phase: String,
    #[serde(default)]
    pub pre_deployment_task_status: Vec<TaskResult>,
    #[serde(default)]
    pub post_deployment_task_status: Vec<TaskResult>,
    #[serde(default)]
    pub pre_deployment_evaluation_task_status: Vec<EvaluationResult>,
    #[serde(default)]
    pub post_deployment_evaluation_task_status: Vec<EvaluationResult>,
    #[serde(default)]
    pub workload_status: Vec<WorkloadResult>,
    /// Trace carriers of open spans, keyed by phase short name
    #[serde(default)]
    pub phase_trace_ids: HashMap<String, TraceCarrier>,
    /// RFC3339, set once
    #[serde(default)]
    pub start_time: Option<String>,
    /// RFC3339, set once; the version is terminal afterwards
    #[serde(default)]
    pub end_time: Option<String>,
}

/// Result of one task created for a task definition
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub definition_name: String,
    pub task_name: String,
    #[serde(default)]
    pub status: LifecycleState,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

/// Result of evaluating one evaluation definition
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub definition_name: String,
    #[serde(default)]
    pub status: LifecycleState,
    /// Number of completed evaluation runs
    #[serde(default)]
    pub attempts: u32,
    /// Latest verdict per objective name
    #[serde(default)]
    pub objectives: BTreeMap<String, ObjectiveStatus>,
    #[serde(default)]
    pub message: Option<String>,
    /// Earliest time of the next run while a failed evaluation waits to be retried
    #[serde(default)]
    pub next_attempt_time: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveStatus {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub status: LifecycleState,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadResult {
    pub workload: WorkloadRef,
    #[serde(default)]
    pub status: LifecycleState,
}

impl AppVersionStatus {
    /// State of a phase. `Completed` and `Deprecated` map to the overall state.
    #[must_use]
    pub fn phase_state(&self, phase: Phase) -> LifecycleState {
        match phase {
            Phase::PreDeploymentTasks => self.pre_deployment_status,
            Phase::PreDeploymentEvaluations => self.pre_deployment_evaluation_status,
            Phase::Deployment => self.workload_overall_status,
            Phase::PostDeploymentTasks => self.post_deployment_status,
            Phase::PostDeploymentEvaluations => self.post_deployment_evaluation_status,
            Phase::Completed | Phase::Deprecated => self.status,
        }
    }

    pub fn set_phase_state(&mut self, phase: Phase, state: LifecycleState) {
        match phase {
            Phase::PreDeploymentTasks => self.pre_deployment_status = state,
            Phase::PreDeploymentEvaluations => self.pre_deployment_evaluation_status = state,
            Phase::Deployment => self.workload_overall_status = state,
            Phase::PostDeploymentTasks => self.post_deployment_status = state,
            Phase::PostDeploymentEvaluations => self.post_deployment_evaluation_status = state,
            Phase::Completed | Phase::Deprecated => self.status = state,
        }
    }

    /// Task results of a task phase
    ///
    /// Returns `None` for phases that do not run tasks.
    pub fn task_results_mut(&mut self, phase: Phase) -> Option<&mut Vec<TaskResult>> {
        match phase {
            Phase::PreDeploymentTasks => Some(&mut self.pre_deployment_task_status),
            Phase::PostDeploymentTasks => Some(&mut self.post_deployment_task_status),
            _ => None,
        }
    }

    /// Evaluation results of an evaluation phase
    pub fn evaluation_results_mut(&mut self, phase: Phase) -> Option<&mut Vec<EvaluationResult>> {
        match phase {
            Phase::PreDeploymentEvaluations => Some(&mut self.pre_deployment_evaluation_task_status),
            Phase::PostDeploymentEvaluations => {
                Some(&mut self.post_deployment_evaluation_task_status)
            }
            _ => None,
        }
    }

    /// Mark phases skipped after `phase` failed.
    ///
    /// Downstream phases that already completed keep their state. The overall
    /// state becomes `Failed`. `Phase::Deprecated` deprecates every phase and
    /// the overall state.
    pub fn deprecate_remaining_phases(&mut self, phase: Phase) {
        if phase == Phase::Deprecated {
            for p in Phase::ORDERED {
                self.set_phase_state(p, LifecycleState::Deprecated);
            }
            self.status = LifecycleState::Deprecated;
            return;
        }
        for p in phase.downstream() {
            if !self.phase_state(*p).is_completed() {
                self.set_phase_state(*p, LifecycleState::Deprecated);
            }
        }
        self.status = LifecycleState::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_pending() -> AppVersionStatus {
        AppVersionStatus::default()
    }

    fn states(status: &AppVersionStatus) -> Vec<LifecycleState> {
        Phase::ORDERED.iter().map(|p| status.phase_state(*p)).collect()
    }

    #[test]
    fn test_cascade_post_evaluation_failure_deprecates_nothing() {
        let mut status = all_pending();
        status.set_phase_state(Phase::PostDeploymentEvaluations, LifecycleState::Failed);
        status.deprecate_remaining_phases(Phase::PostDeploymentEvaluations);

        assert_eq!(
            states(&status),
            vec![
                LifecycleState::Pending,
                LifecycleState::Pending,
                LifecycleState::Pending,
                LifecycleState::Pending,
                LifecycleState::Failed,
            ]
        );
        assert_eq!(status.status, LifecycleState::Failed);
    }

    #[test]
    fn test_cascade_post_tasks_failure() {
        let mut status = all_pending();
        status.deprecate_remaining_phases(Phase::PostDeploymentTasks);
        assert_eq!(
            status.post_deployment_evaluation_status,
            LifecycleState::Deprecated
        );
        assert_eq!(status.workload_overall_status, LifecycleState::Pending);
        assert_eq!(status.pre_deployment_status, LifecycleState::Pending);
    }

    #[test]
    fn test_cascade_deployment_failure() {
        let mut status = all_pending();
        status.deprecate_remaining_phases(Phase::Deployment);
        assert_eq!(status.post_deployment_status, LifecycleState::Deprecated);
        assert_eq!(
            status.post_deployment_evaluation_status,
            LifecycleState::Deprecated
        );
        assert_eq!(status.pre_deployment_evaluation_status, LifecycleState::Pending);
    }

    #[test]
    fn test_cascade_pre_evaluation_failure() {
        let mut status = all_pending();
        status.deprecate_remaining_phases(Phase::PreDeploymentEvaluations);
        assert_eq!(status.workload_overall_status, LifecycleState::Deprecated);
        assert_eq!(status.post_deployment_status, LifecycleState::Deprecated);
        assert_eq!(
            status.post_deployment_evaluation_status,
            LifecycleState::Deprecated
        );
        assert_eq!(status.pre_deployment_status, LifecycleState::Pending);
    }

    #[test]
    fn test_cascade_pre_tasks_failure() {
        let mut status = all_pending();
        status.set_phase_state(Phase::PreDeploymentTasks, LifecycleState::Failed);
        status.deprecate_remaining_phases(Phase::PreDeploymentTasks);
        assert_eq!(
            states(&status),
            vec![
                LifecycleState::Failed,
                LifecycleState::Deprecated,
                LifecycleState::Deprecated,
                LifecycleState::Deprecated,
                LifecycleState::Deprecated,
            ]
        );
    }

    #[test]
    fn test_cascade_keeps_completed_phases() {
        let mut status = all_pending();
        status.post_deployment_status = LifecycleState::Succeeded;
        status.deprecate_remaining_phases(Phase::Deployment);
        assert_eq!(status.post_deployment_status, LifecycleState::Succeeded);
        assert_eq!(
            status.post_deployment_evaluation_status,
            LifecycleState::Deprecated
        );
    }

    #[test]
    fn test_full_deprecation_marks_everything() {
        let mut status = all_pending();
        status.pre_deployment_status = LifecycleState::Succeeded;
        status.deprecate_remaining_phases(Phase::Deprecated);
        assert!(states(&status).iter().all(|s| s.is_deprecated()));
        assert_eq!(status.status, LifecycleState::Deprecated);
    }
}
