//! # Reconciliation Entry Point
//!
//! Called by the controller runtime for every `KeptnAppVersion` event or requeue.
//! Errors are handled by the error policy in `runtime::error_policy`.

use super::types::{Directive, Reconciler, ReconcilerError};
use crate::crd::AppVersion;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, Instrument};

/// Reconcile one app version
///
/// The watched object may be stale, so the latest version is read from the
/// store before anything is decided.
///
/// # Errors
///
/// Returns an error when the store fails; the error policy decides the retry.
pub async fn reconcile(
    obj: Arc<AppVersion>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let name = obj.name().to_string();
    let namespace = obj.namespace().to_string();
    let span = tracing::span!(
        tracing::Level::INFO,
        "reconcile",
        resource.name = name.as_str(),
        resource.namespace = namespace.as_str(),
        resource.kind = "KeptnAppVersion",
        app.name = obj.spec.app_name.as_str(),
        app.version = obj.spec.version.as_str(),
    );

    async move {
        let start = Instant::now();
        ctx.metrics.increment_reconciliations();
        info!("🔄 Reconciling KeptnAppVersion: {}/{}", namespace, name);

        let result = reconcile_latest(&namespace, &name, &ctx).await;
        ctx.metrics
            .observe_reconciliation_duration(start.elapsed().as_secs_f64());

        let directive = result?;
        ctx.reset_backoff(&format!("{namespace}/{name}"));
        debug!("Reconciled {}/{}: {:?}", namespace, name, directive);
        Ok(directive.into_action(ctx.config.conflict_requeue_duration()))
    }
    .instrument(span)
    .await
}

async fn reconcile_latest(
    namespace: &str,
    name: &str,
    ctx: &Reconciler,
) -> Result<Directive, ReconcilerError> {
    let Some(app) = ctx.store.get_app_version(namespace, name).await? else {
        debug!("KeptnAppVersion {}/{} is gone", namespace, name);
        ctx.spans.forget(namespace, name);
        return Ok(Directive::Stop);
    };

    if app.is_end_time_set() {
        return Ok(Directive::Stop);
    }
    if ctx.is_superseded(&app).await? {
        return ctx.deprecate(app).await;
    }
    ctx.advance(app).await
}
