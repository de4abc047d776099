//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::backoff::BackoffState;
use crate::controller::events::EventSink;
use crate::controller::span::SpanHandler;
use crate::controller::store::{StateStore, StoreError};
use crate::crd::LifecycleState;
use crate::evaluation::{EngineError, ProviderResolver};
use crate::observability::ControllerMetrics;
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("state store error: {0}")]
    Store(#[from] StoreError),
    #[error("evaluation aborted: {0}")]
    Evaluation(#[from] EngineError),
}

impl ReconcilerError {
    /// Directive that overrides the error policy's backoff, if any
    #[must_use]
    pub fn directive(&self) -> Option<Directive> {
        match self {
            Self::Store(e) if e.is_conflict() => Some(Directive::RequeueImmediately),
            _ => None,
        }
    }
}

/// What to do after an `advance` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Terminal; wait for the object to change
    Stop,
    RequeueAfter(Duration),
    /// Re-read the object and try again right away
    RequeueImmediately,
}

impl Directive {
    /// Convert to a controller action; "immediately" still waits `conflict_delay`
    #[must_use]
    pub fn into_action(self, conflict_delay: Duration) -> Action {
        match self {
            Directive::Stop => Action::await_change(),
            Directive::RequeueAfter(delay) => Action::requeue(delay),
            Directive::RequeueImmediately => Action::requeue(conflict_delay),
        }
    }
}

/// Result of one work function run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PhaseProgress {
    pub state: LifecycleState,
    /// Requested delay before the next attempt, overriding the phase requeue
    pub retry_after: Option<Duration>,
}

impl From<LifecycleState> for PhaseProgress {
    fn from(state: LifecycleState) -> Self {
        Self {
            state,
            retry_after: None,
        }
    }
}

/// Shared reconciler context
#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn StateStore>,
    pub resolver: Arc<dyn ProviderResolver>,
    pub events: Arc<dyn EventSink>,
    pub spans: Arc<SpanHandler>,
    pub metrics: Arc<ControllerMetrics>,
    pub config: ControllerConfig,
    // Backoff state per resource (identified by namespace/name), owned by the error policy
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("spans", &self.spans)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(
        store: Arc<dyn StateStore>,
        resolver: Arc<dyn ProviderResolver>,
        events: Arc<dyn EventSink>,
        spans: Arc<SpanHandler>,
        metrics: Arc<ControllerMetrics>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            events,
            spans,
            metrics,
            config,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Forget the error backoff of a resource after a successful reconcile
    pub fn reset_backoff(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(resource_key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_requeues_immediately() {
        let error = ReconcilerError::Store(StoreError::Conflict("demo/app".to_string()));
        assert_eq!(error.directive(), Some(Directive::RequeueImmediately));

        let error = ReconcilerError::Store(StoreError::NotFound("demo/app".to_string()));
        assert_eq!(error.directive(), None);
    }
}
