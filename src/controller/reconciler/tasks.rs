//! # Task Phases
//!
//! Creates one task per task definition of a pre- or post-deployment phase
//! and mirrors the task states into the app version status.

use super::types::{Reconciler, ReconcilerError};
use crate::controller::store::StoreError;
use crate::crd::{
    AppVersion, CheckType, KeptnTask, LifecycleState, Phase, StateSummary, TaskResult, TaskSpec,
};
use kube::Resource;
use tracing::{debug, info};

impl Reconciler {
    pub(crate) async fn reconcile_tasks(
        &self,
        app: &mut AppVersion,
        phase: Phase,
    ) -> Result<LifecycleState, ReconcilerError> {
        let Some(check_type) = phase.check_type() else {
            return Ok(app.phase_state(phase));
        };
        let definitions = match phase {
            Phase::PreDeploymentTasks => app.spec.pre_deployment_tasks.clone(),
            _ => app.spec.post_deployment_tasks.clone(),
        };
        let existing = app
            .status_mut()
            .task_results_mut(phase)
            .cloned()
            .unwrap_or_default();

        let mut results = Vec::with_capacity(definitions.len());
        for definition in &definitions {
            if let Some(done) = existing
                .iter()
                .find(|r| &r.definition_name == definition && r.status.is_completed())
            {
                results.push(done.clone());
                continue;
            }

            let task_name = app.task_name(check_type, definition);
            let mut result = existing
                .iter()
                .find(|r| &r.definition_name == definition)
                .cloned()
                .unwrap_or_else(|| TaskResult {
                    definition_name: definition.clone(),
                    task_name: task_name.clone(),
                    ..Default::default()
                });

            match self.store.get_task(app.namespace(), &task_name).await? {
                Some(task) => {
                    let status = task.status.clone().unwrap_or_default();
                    result.status = status.status;
                    result.start_time = status.start_time.or(result.start_time);
                    if result.status.is_completed() {
                        result.end_time = status
                            .end_time
                            .or_else(|| Some(chrono::Utc::now().to_rfc3339()));
                    }
                }
                None => {
                    self.create_task(app, check_type, definition, &task_name).await?;
                    result.status = LifecycleState::Pending;
                }
            }
            results.push(result);
        }

        let state: StateSummary = results.iter().map(|r| r.status).collect();
        if let Some(slot) = app.status_mut().task_results_mut(phase) {
            *slot = results;
        }
        Ok(state.overall())
    }

    async fn create_task(
        &self,
        app: &AppVersion,
        check_type: CheckType,
        definition: &str,
        task_name: &str,
    ) -> Result<(), ReconcilerError> {
        let mut task = KeptnTask::new(
            task_name,
            TaskSpec {
                app_name: app.spec.app_name.clone(),
                app_version: app.spec.version.clone(),
                task_definition: definition.to_string(),
                check_type,
            },
        );
        task.metadata.namespace = Some(app.namespace().to_string());
        task.metadata.owner_references = app.controller_owner_ref(&()).map(|r| vec![r]);

        match self.store.create_task(&task).await {
            Ok(()) => {
                info!(
                    "Created {} task {} for {}/{}",
                    check_type.as_str(),
                    task_name,
                    app.namespace(),
                    app.name()
                );
                Ok(())
            }
            Err(StoreError::AlreadyExists(_)) => {
                debug!("Task {} already exists", task_name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
