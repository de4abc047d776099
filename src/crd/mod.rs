//! # Custom Resource Definitions
//!
//! CRD types for the lifecycle controller.
//!
//! ## Module Structure
//!
//! - `state.rs` - Lifecycle states, phases and check types
//! - `app_version.rs` - The `KeptnAppVersion` resource driven by the controller
//! - `status.rs` - Status and result records of an app version
//! - `task.rs` - Tasks created for task phases
//! - `workload.rs` - Workload instances observed during deployment
//! - `evaluation.rs` - Evaluation definitions and metrics providers

mod app_version;
mod evaluation;
mod state;
mod status;
mod task;
mod workload;

// Re-export all public types
pub use app_version::{AppVersion, AppVersionSpec, KeptnAppVersion, WorkloadRef, APP_TRACE_KEY};
pub use evaluation::{
    default_retry_interval, EvaluationDefinition, EvaluationDefinitionSpec, EvaluationProvider,
    EvaluationProviderSpec, KeptnEvaluationDefinition, KeptnEvaluationProvider, Objective,
    SecretKeyRef,
};
pub use state::{CheckType, LifecycleState, Phase, StateSummary};
pub use status::{
    AppVersionStatus, EvaluationResult, ObjectiveStatus, TaskResult, TraceCarrier, WorkloadResult,
};
pub use task::{KeptnTask, Task, TaskSpec, TaskStatus};
pub use workload::{
    KeptnWorkloadInstance, WorkloadInstance, WorkloadInstanceSpec, WorkloadInstanceStatus,
};
