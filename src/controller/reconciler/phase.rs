//! # Phase Orchestration
//!
//! Drives an app version through its five phases in order.
//!
//! Each call advances the version as far as it can without waiting. A phase
//! that is still running persists `Progressing` and asks for a requeue. A
//! succeeded phase hands over to the next one in the same call. A failed
//! phase deprecates every phase downstream of it and ends the version.
//! Terminal states are never revisited: a version with an end time is done.

use super::types::{Directive, PhaseProgress, Reconciler, ReconcilerError};
use crate::controller::events::LifecycleEvent;
use crate::controller::span::PhaseSpan;
use crate::crd::{AppVersion, LifecycleState, Phase};
use kube::runtime::events::EventType;
use tracing::{debug, info, warn};

impl Reconciler {
    /// Advance `app` as far as possible and say when to look at it again
    ///
    /// # Errors
    ///
    /// Returns an error when the store or a provider lookup fails transiently.
    /// Nothing is marked failed in that case.
    pub async fn advance(&self, mut app: AppVersion) -> Result<Directive, ReconcilerError> {
        if app.is_end_time_set() || app.overall_state().is_deprecated() {
            debug!("{}/{} is terminal, nothing to do", app.namespace(), app.name());
            return Ok(Directive::Stop);
        }

        // Announced once the start time has been written
        let mut started = None;
        if !app.is_start_time_set() {
            app.set_start_time();
            info!(
                "▶️  Starting app version {}/{} ({} {})",
                app.namespace(),
                app.name(),
                app.spec.app_name,
                app.spec.version
            );
            started = Some(LifecycleEvent::for_app(
                EventType::Normal,
                &app,
                "Started",
                "has started",
            ));
        }

        let origin = self.spans.origin_context(&app);
        let root = self.spans.resume(&mut app, None, &origin);

        for phase in Phase::ORDERED {
            let previous = app.phase_state(phase);
            if previous.is_succeeded() {
                continue;
            }

            app.status_mut().current_phase = phase.long_name().to_string();
            let span = self.spans.resume(&mut app, Some(phase), root.context());

            // A completed but unsuccessful phase without an end time was cut short
            // between writes; finish the failure instead of rerunning its work
            let progress = if previous.is_completed() {
                PhaseProgress::from(LifecycleState::Failed)
            } else {
                self.run_phase(&mut app, phase).await?
            };

            match progress.state {
                LifecycleState::Succeeded => {
                    app.status_mut().set_phase_state(phase, LifecycleState::Succeeded);
                    span.add_event(&format!("{} has succeeded", phase.long_name()), Vec::new());
                    self.spans.close(&mut app, Some(phase), Ok(()));
                    self.persist_announcing(&mut app, &mut started).await?;
                    info!("✅ {} succeeded for {}/{}", phase, app.namespace(), app.name());
                    let event = LifecycleEvent::for_phase(
                        EventType::Normal,
                        phase,
                        &app,
                        "Succeeded",
                        "has succeeded",
                    );
                    self.events.publish(&app, event).await;
                }
                LifecycleState::Failed | LifecycleState::Deprecated => {
                    return self.fail_phase(app, phase, &span, started).await;
                }
                LifecycleState::Pending | LifecycleState::Progressing => {
                    app.status_mut().set_phase_state(phase, LifecycleState::Progressing);
                    self.persist_announcing(&mut app, &mut started).await?;
                    if previous != LifecycleState::Progressing {
                        let event = LifecycleEvent::for_phase(
                            EventType::Normal,
                            phase,
                            &app,
                            "NotFinished",
                            "has not finished",
                        );
                        self.events.publish(&app, event).await;
                    }
                    let delay = progress
                        .retry_after
                        .unwrap_or_else(|| self.config.phase_requeue_duration());
                    debug!(
                        "{} still running for {}/{}, requeue in {:?}",
                        phase,
                        app.namespace(),
                        app.name(),
                        delay
                    );
                    return Ok(Directive::RequeueAfter(delay));
                }
            }
        }

        self.finish(app, started).await
    }

    async fn run_phase(
        &self,
        app: &mut AppVersion,
        phase: Phase,
    ) -> Result<PhaseProgress, ReconcilerError> {
        match phase {
            Phase::PreDeploymentTasks | Phase::PostDeploymentTasks => {
                Ok(self.reconcile_tasks(app, phase).await?.into())
            }
            Phase::PreDeploymentEvaluations | Phase::PostDeploymentEvaluations => {
                self.reconcile_evaluations(app, phase).await
            }
            Phase::Deployment => Ok(self.reconcile_workloads(app).await?.into()),
            Phase::Completed | Phase::Deprecated => Ok(app.phase_state(phase).into()),
        }
    }

    async fn fail_phase(
        &self,
        mut app: AppVersion,
        phase: Phase,
        span: &PhaseSpan,
        mut started: Option<LifecycleEvent>,
    ) -> Result<Directive, ReconcilerError> {
        let message = format!("{} has failed", phase.long_name());
        span.add_event(&message, Vec::new());
        app.status_mut().set_phase_state(phase, LifecycleState::Failed);
        self.spans.close(&mut app, Some(phase), Err(&message));

        app.status_mut().deprecate_remaining_phases(phase);
        app.set_end_time();
        self.spans.close(&mut app, None, Err(&message));
        self.persist_announcing(&mut app, &mut started).await?;

        warn!("❌ {} failed for {}/{}", phase, app.namespace(), app.name());
        let event =
            LifecycleEvent::for_phase(EventType::Warning, phase, &app, "Failed", "has failed");
        self.events.publish(&app, event).await;
        self.metrics.increment_app_count(&app);
        Ok(Directive::Stop)
    }

    async fn finish(
        &self,
        mut app: AppVersion,
        mut started: Option<LifecycleEvent>,
    ) -> Result<Directive, ReconcilerError> {
        app.set_end_time();
        let status = app.status_mut();
        status.current_phase = Phase::Completed.long_name().to_string();
        if !status.status.is_failed() && !status.status.is_deprecated() {
            status.status = LifecycleState::Succeeded;
        }
        self.spans.close(&mut app, None, Ok(()));
        self.persist_announcing(&mut app, &mut started).await?;

        info!(
            "🏁 App version {}/{} finished: {}",
            app.namespace(),
            app.name(),
            app.overall_state()
        );
        let event = LifecycleEvent::for_app(EventType::Normal, &app, "Finished", "has finished");
        self.events.publish(&app, event).await;
        self.metrics.observe_app_duration(&app);
        self.metrics.increment_app_count(&app);
        Ok(Directive::Stop)
    }

    /// Write the status and pick up the new resource version
    pub(crate) async fn persist(&self, app: &mut AppVersion) -> Result<(), ReconcilerError> {
        let stored = self.store.update_app_version_status(app).await?;
        app.metadata.resource_version = stored.metadata.resource_version;
        Ok(())
    }

    /// Persist, then publish the pending start event if there is one
    async fn persist_announcing(
        &self,
        app: &mut AppVersion,
        started: &mut Option<LifecycleEvent>,
    ) -> Result<(), ReconcilerError> {
        self.persist(app).await?;
        if let Some(event) = started.take() {
            self.events.publish(app, event).await;
        }
        Ok(())
    }
}
