//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use crate::controller::backoff::BackoffState;
use crate::controller::reconciler::{Directive, Reconciler, ReconcilerError};
use crate::crd::AppVersion;
use kube_runtime::controller::Action;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn, Instrument};

/// Handle reconciliation errors
///
/// Status write conflicts are retried right away with a fresh read. Everything
/// else waits out a Fibonacci backoff tracked per resource, so one failing app
/// version does not slow down the others.
pub fn handle_reconciliation_error(
    obj: Arc<AppVersion>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.name();
    let namespace = obj.namespace();

    if let Some(directive @ Directive::RequeueImmediately) = error.directive() {
        debug!("Status of {}/{} changed underneath us, retrying", namespace, name);
        return directive.into_action(ctx.config.conflict_requeue_duration());
    }

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = name,
        resource.namespace = namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}/{}: {:?}", namespace, name, error);
    ctx.metrics.increment_reconciliation_errors();

    let resource_key = format!("{namespace}/{name}");
    let (delay, error_count) = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states.entry(resource_key).or_insert_with(|| {
                BackoffState::new(ctx.config.backoff_min_minutes, ctx.config.backoff_max_minutes)
            });
            let delay = state.record_error();
            (delay, state.error_count)
        }
        Err(e) => {
            warn!("Failed to lock backoff_states: {}, using default backoff", e);
            (Duration::from_secs(ctx.config.backoff_min_minutes * 60), 0)
        }
    };

    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
    info!(
        "🔄 Retrying with Fibonacci backoff: {}s (error count: {})",
        delay.as_secs(),
        error_count
    );
    info!(
        "📅 Next retry scheduled: {} (in {}s)",
        next_trigger_time.to_rfc3339(),
        delay.as_secs()
    );

    Action::requeue(delay)
}

/// Handle watch stream errors
///
/// Returns `None` to filter the error out and let the watch restart, or
/// `Some(())` to keep the event.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff_ms: &AtomicU64,
    max_backoff_ms: u64,
    restart_delay: Duration,
) -> Option<()> {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );
    classify_watch_error(error_string, backoff_ms, max_backoff_ms, restart_delay)
        .instrument(error_span)
        .await
}

async fn classify_watch_error(
    error_string: &str,
    backoff_ms: &AtomicU64,
    max_backoff_ms: u64,
    restart_delay: Duration,
) -> Option<()> {
    // 404 before 401: a plain-text 404 body surfaces as a serde error mentioning WatchFailed
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    let is_401 =
        (error_string.contains("401") || error_string.contains("Unauthorized")) && !is_not_found;
    let is_410 = error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Gone");
    let is_429 = error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests");

    if is_401 {
        error!("❌ Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired");
        error!("   Verify the controller can still list KeptnAppVersions:");
        error!("      kubectl auth can-i list keptnappversions.lifecycle.keptn.sh --all-namespaces");
        warn!("⏳ Waiting {:?} before retrying watch...", restart_delay);
        tokio::time::sleep(restart_delay).await;
        None
    } else if is_410 {
        warn!("Watch resource version expired (410) - watch will restart");
        None
    } else if is_429 {
        let current = backoff_ms.load(Ordering::Relaxed);
        warn!("API server throttling (429), backing off for {}ms before restart...", current);
        tokio::time::sleep(Duration::from_millis(current)).await;
        backoff_ms.store((current * 2).min(max_backoff_ms), Ordering::Relaxed);
        None
    } else if is_not_found {
        warn!(
            "Resource not found (404) - the CRD may be missing or the object was deleted. Error: {}",
            error_string
        );
        Some(())
    } else {
        error!("Controller stream error: {}", error_string);
        tokio::time::sleep(restart_delay).await;
        None
    }
}
