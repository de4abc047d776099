//! # Evaluation Phases
//!
//! Runs the evaluation definitions of a pre- or post-deployment evaluation
//! phase and records one result per definition.
//!
//! A failed evaluation is retried up to `retries` more times, `retryInterval`
//! apart, before its failure becomes final. The time of the next run is kept
//! in the result, so an earlier invocation waits instead of using up an attempt.

use super::duration::parse_kubernetes_duration;
use super::types::{PhaseProgress, Reconciler, ReconcilerError};
use crate::crd::{
    AppVersion, EvaluationDefinition, EvaluationResult, LifecycleState, ObjectiveStatus, Phase,
    StateSummary,
};
use crate::evaluation::{evaluate, EvaluationOutcome};
use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;
use tracing::{debug, info, warn};

impl Reconciler {
    pub(crate) async fn reconcile_evaluations(
        &self,
        app: &mut AppVersion,
        phase: Phase,
    ) -> Result<PhaseProgress, ReconcilerError> {
        let definitions = match phase {
            Phase::PreDeploymentEvaluations => app.spec.pre_deployment_evaluations.clone(),
            Phase::PostDeploymentEvaluations => app.spec.post_deployment_evaluations.clone(),
            _ => return Ok(app.phase_state(phase).into()),
        };
        let existing = app
            .status_mut()
            .evaluation_results_mut(phase)
            .cloned()
            .unwrap_or_default();

        let namespace = app.namespace().to_string();
        let mut retry_after: Option<Duration> = None;
        let mut results = Vec::with_capacity(definitions.len());

        for name in &definitions {
            let mut result = existing
                .iter()
                .find(|r| &r.definition_name == name)
                .cloned()
                .unwrap_or_else(|| EvaluationResult {
                    definition_name: name.clone(),
                    ..Default::default()
                });
            if result.status.is_completed() {
                results.push(result);
                continue;
            }
            let now = Utc::now();
            if let Some(wait) = remaining_wait(&result, now) {
                debug!("Evaluation {} waits {:?} before its next attempt", name, wait);
                retry_after = Some(retry_after.map_or(wait, |d| d.min(wait)));
                results.push(result);
                continue;
            }
            if result.start_time.is_none() {
                result.start_time = Some(now.to_rfc3339());
            }

            let Some(definition) = self
                .store
                .get_evaluation_definition(&namespace, name)
                .await?
            else {
                warn!("Evaluation definition {} not found in {}", name, namespace);
                result.status = LifecycleState::Failed;
                result.message = Some(format!("evaluation definition {name} not found"));
                result.end_time = Some(Utc::now().to_rfc3339());
                results.push(result);
                continue;
            };

            let outcome = evaluate(&namespace, &definition, self.resolver.as_ref()).await?;
            self.record_verdicts(&outcome);
            let fallback = self.config.phase_requeue_duration();
            if let Some(delay) = apply_outcome(&mut result, &definition, outcome, fallback, now) {
                retry_after = Some(retry_after.map_or(delay, |d| d.min(delay)));
            }
            results.push(result);
        }

        let state: StateSummary = results.iter().map(|r| r.status).collect();
        if let Some(slot) = app.status_mut().evaluation_results_mut(phase) {
            *slot = results;
        }
        Ok(PhaseProgress {
            state: state.overall(),
            retry_after,
        })
    }

    fn record_verdicts(&self, outcome: &EvaluationOutcome) {
        for verdict in &outcome.verdicts {
            self.metrics
                .record_evaluation(&verdict.provider, verdict.state.as_str());
        }
    }
}

/// Time left until a result waiting for a retry may run again
fn remaining_wait(result: &EvaluationResult, now: DateTime<Utc>) -> Option<Duration> {
    if result.status != LifecycleState::Progressing {
        return None;
    }
    let next = DateTime::parse_from_rfc3339(result.next_attempt_time.as_deref()?).ok()?;
    (next.with_timezone(&Utc) - now).to_std().ok().filter(|d| !d.is_zero())
}

/// Fold an evaluation run into its result
///
/// Returns the retry delay when the failure is not final yet. An unusable
/// `retryInterval` falls back to `fallback`.
fn apply_outcome(
    result: &mut EvaluationResult,
    definition: &EvaluationDefinition,
    outcome: EvaluationOutcome,
    fallback: Duration,
    now: DateTime<Utc>,
) -> Option<Duration> {
    result.attempts += 1;
    result.objectives = outcome
        .verdicts
        .into_iter()
        .map(|v| {
            (
                v.objective,
                ObjectiveStatus {
                    value: v.value,
                    status: v.state,
                    message: v.message,
                },
            )
        })
        .collect();

    if outcome.state.is_failed() && result.attempts <= definition.spec.retries {
        let delay = match parse_kubernetes_duration(&definition.spec.retry_interval) {
            Ok(delay) => delay,
            Err(e) => {
                warn!("Ignoring retry interval of {}: {}", definition.name(), e);
                fallback
            }
        };
        result.next_attempt_time = TimeDelta::from_std(delay)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .map(|t| t.to_rfc3339());
        info!(
            "🔄 Evaluation {} failed (attempt {} of {}), retrying",
            definition.name(),
            result.attempts,
            definition.spec.retries + 1
        );
        result.status = LifecycleState::Progressing;
        result.message = Some(format!(
            "attempt {} of {} failed",
            result.attempts,
            definition.spec.retries + 1
        ));
        return Some(delay);
    }

    result.status = outcome.state;
    result.next_attempt_time = None;
    result.message = result
        .objectives
        .iter()
        .filter(|(_, o)| o.status.is_failed())
        .map(|(name, o)| format!("{name}: {}", o.message.as_deref().unwrap_or("failed")))
        .reduce(|a, b| format!("{a}; {b}"));
    result.end_time = Some(now.to_rfc3339());
    None
}
