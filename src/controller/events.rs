//! # Lifecycle Events
//!
//! Kubernetes events published against an app version as it moves through
//! its phases.
//!
//! Phase events use the reason `<phase short name><short reason>`, e.g.
//! `AppPreDeployTasksSucceeded`, and a note naming the phase, the outcome and
//! the app version.

use crate::constants::EVENT_REPORTER;
use crate::crd::{AppVersion, Phase};
use async_trait::async_trait;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource};
use tracing::{debug, warn};

/// Event about an app version's progress
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleEvent {
    pub event_type: EventType,
    pub reason: String,
    pub note: String,
}

impl LifecycleEvent {
    /// Event for a phase transition
    #[must_use]
    pub fn for_phase(
        event_type: EventType,
        phase: Phase,
        app: &AppVersion,
        short_reason: &str,
        long_reason: &str,
    ) -> Self {
        Self {
            event_type,
            reason: format!("{}{short_reason}", phase.short_name()),
            note: format!("{} {long_reason} / {}", phase.long_name(), describe(app)),
        }
    }

    /// Event for the app version as a whole
    #[must_use]
    pub fn for_app(event_type: EventType, app: &AppVersion, short_reason: &str, long_reason: &str) -> Self {
        Self {
            event_type,
            reason: format!("AppVersion{short_reason}"),
            note: format!("AppVersion {long_reason} / {}", describe(app)),
        }
    }
}

fn describe(app: &AppVersion) -> String {
    format!(
        "Namespace: {}, Name: {}, Version: {}",
        app.namespace(),
        app.name(),
        app.spec.version
    )
}

/// Destination for lifecycle events
///
/// Publishing is best effort: failures are logged and never fail a reconcile.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, app: &AppVersion, event: LifecycleEvent);
}

/// Publishes events to the Kubernetes events API
pub struct KubeEventSink {
    recorder: Recorder,
}

impl std::fmt::Debug for KubeEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventSink").finish_non_exhaustive()
    }
}

impl KubeEventSink {
    #[must_use]
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: EVENT_REPORTER.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventSink for KubeEventSink {
    async fn publish(&self, app: &AppVersion, event: LifecycleEvent) {
        let reference = app.object_ref(&());
        let reason = event.reason.clone();
        let result = self
            .recorder
            .publish(
                &Event {
                    type_: event.event_type,
                    reason: event.reason,
                    note: Some(event.note),
                    action: "Reconcile".to_string(),
                    secondary: None,
                },
                &reference,
            )
            .await;

        match result {
            Ok(()) => debug!("Published event {} for {}/{}", reason, app.namespace(), app.name()),
            Err(e) => warn!(
                "Failed to publish event {} for {}/{}: {}",
                reason,
                app.namespace(),
                app.name(),
                e
            ),
        }
    }
}
