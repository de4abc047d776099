//! # Lifecycle State and Phases
//!
//! The state enumeration shared by every phase, sub-record and collaborator
//! resource, plus the fixed set of lifecycle phases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a phase, a sub-record or a whole `AppVersion`
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema,
)]
pub enum LifecycleState {
    #[default]
    Pending,
    Progressing,
    Succeeded,
    Failed,
    Deprecated,
}

impl LifecycleState {
    /// Terminal states: `Succeeded`, `Failed` and `Deprecated`
    #[must_use]
    pub fn is_completed(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Deprecated)
    }

    #[must_use]
    pub fn is_succeeded(self) -> bool {
        self == Self::Succeeded
    }

    #[must_use]
    pub fn is_failed(self) -> bool {
        self == Self::Failed
    }

    #[must_use]
    pub fn is_deprecated(self) -> bool {
        self == Self::Deprecated
    }

    #[must_use]
    pub fn is_pending(self) -> bool {
        self == Self::Pending
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Progressing => "Progressing",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Deprecated => "Deprecated",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts of sub-record states, folded into one overall state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateSummary {
    pub total: usize,
    pub pending: usize,
    pub progressing: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub deprecated: usize,
}

impl StateSummary {
    pub fn add(&mut self, state: LifecycleState) {
        self.total += 1;
        match state {
            LifecycleState::Pending => self.pending += 1,
            LifecycleState::Progressing => self.progressing += 1,
            LifecycleState::Succeeded => self.succeeded += 1,
            LifecycleState::Failed => self.failed += 1,
            LifecycleState::Deprecated => self.deprecated += 1,
        }
    }

    /// Failure wins over progress, progress over pending.
    /// An empty summary has nothing left to do and counts as `Succeeded`.
    #[must_use]
    pub fn overall(&self) -> LifecycleState {
        if self.failed > 0 || self.deprecated > 0 {
            LifecycleState::Failed
        } else if self.progressing > 0 {
            LifecycleState::Progressing
        } else if self.pending > 0 {
            LifecycleState::Pending
        } else {
            LifecycleState::Succeeded
        }
    }
}

impl FromIterator<LifecycleState> for StateSummary {
    fn from_iter<I: IntoIterator<Item = LifecycleState>>(iter: I) -> Self {
        let mut summary = Self::default();
        for state in iter {
            summary.add(state);
        }
        summary
    }
}

/// Lifecycle phases of an `AppVersion`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    PreDeploymentTasks,
    PreDeploymentEvaluations,
    Deployment,
    PostDeploymentTasks,
    PostDeploymentEvaluations,
    Completed,
    /// Full deprecation, e.g. the version was superseded
    Deprecated,
}

impl Phase {
    /// Executable phases in execution order
    pub const ORDERED: [Phase; 5] = [
        Phase::PreDeploymentTasks,
        Phase::PreDeploymentEvaluations,
        Phase::Deployment,
        Phase::PostDeploymentTasks,
        Phase::PostDeploymentEvaluations,
    ];

    #[must_use]
    pub fn long_name(self) -> &'static str {
        match self {
            Phase::PreDeploymentTasks => "App Pre-Deployment Tasks",
            Phase::PreDeploymentEvaluations => "App Pre-Deployment Evaluations",
            Phase::Deployment => "App Deployment",
            Phase::PostDeploymentTasks => "App Post-Deployment Tasks",
            Phase::PostDeploymentEvaluations => "App Post-Deployment Evaluations",
            Phase::Completed => "Completed",
            Phase::Deprecated => "Deprecated",
        }
    }

    /// Key under which the phase's trace carrier is persisted
    #[must_use]
    pub fn short_name(self) -> &'static str {
        match self {
            Phase::PreDeploymentTasks => "AppPreDeployTasks",
            Phase::PreDeploymentEvaluations => "AppPreDeployEvaluations",
            Phase::Deployment => "AppDeploy",
            Phase::PostDeploymentTasks => "AppPostDeployTasks",
            Phase::PostDeploymentEvaluations => "AppPostDeployEvaluations",
            Phase::Completed => "Completed",
            Phase::Deprecated => "Deprecated",
        }
    }

    /// Check type of the tasks/evaluations a phase runs, if any
    #[must_use]
    pub fn check_type(self) -> Option<CheckType> {
        match self {
            Phase::PreDeploymentTasks => Some(CheckType::PreDeployment),
            Phase::PostDeploymentTasks => Some(CheckType::PostDeployment),
            Phase::PreDeploymentEvaluations => Some(CheckType::PreDeploymentEvaluation),
            Phase::PostDeploymentEvaluations => Some(CheckType::PostDeploymentEvaluation),
            Phase::Deployment | Phase::Completed | Phase::Deprecated => None,
        }
    }

    /// Phases after `self` in execution order
    #[must_use]
    pub fn downstream(self) -> &'static [Phase] {
        match Phase::ORDERED.iter().position(|p| *p == self) {
            Some(index) => &Phase::ORDERED[index + 1..],
            None => &[],
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.long_name())
    }
}

/// Kind of check a `Task` or evaluation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema)]
pub enum CheckType {
    #[serde(rename = "pre")]
    PreDeployment,
    #[serde(rename = "post")]
    PostDeployment,
    #[serde(rename = "pre-eval")]
    PreDeploymentEvaluation,
    #[serde(rename = "post-eval")]
    PostDeploymentEvaluation,
}

impl CheckType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CheckType::PreDeployment => "pre",
            CheckType::PostDeployment => "post",
            CheckType::PreDeploymentEvaluation => "pre-eval",
            CheckType::PostDeploymentEvaluation => "post-eval",
        }
    }
}
