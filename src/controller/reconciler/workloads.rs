//! # Deployment Phase
//!
//! Mirrors the rollout state of each workload instance of the app version.

use super::types::{Reconciler, ReconcilerError};
use crate::crd::{AppVersion, LifecycleState, StateSummary, WorkloadResult};
use tracing::debug;

impl Reconciler {
    pub(crate) async fn reconcile_workloads(
        &self,
        app: &mut AppVersion,
    ) -> Result<LifecycleState, ReconcilerError> {
        let mut results = Vec::with_capacity(app.spec.workloads.len());
        for workload in &app.spec.workloads {
            let instance_name = app.workload_instance_name(workload);
            let status = self
                .store
                .get_workload_instance(app.namespace(), &instance_name)
                .await?
                .map_or(LifecycleState::Pending, |instance| instance.state());
            debug!("Workload instance {} is {}", instance_name, status);
            results.push(WorkloadResult {
                workload: workload.clone(),
                status,
            });
        }

        let state: StateSummary = results.iter().map(|r| r.status).collect();
        app.status_mut().workload_status = results;
        Ok(state.overall())
    }
}
