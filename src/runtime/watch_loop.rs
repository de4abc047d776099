//! # Watch Loop
//!
//! Controller watch loop that monitors `KeptnAppVersion` resources and triggers
//! reconciliation when changes are detected.
//!
//! Only spec changes trigger a reconcile. The controller writes the status on
//! every pass, and those writes leave `metadata.generation` alone, so they are
//! filtered out. Progress is driven by the requeue each reconcile returns.

use crate::controller::reconciler::{reconcile, Reconciler};
use crate::crd::AppVersion;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use crate::server::ServerState;
use futures::StreamExt;
use kube::api::Api;
use kube_runtime::{controller, predicates, reflector, watcher, Controller, WatchStreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const WATCH_BACKOFF_START_MS: u64 = 1_000;
const WATCH_BACKOFF_MAX_MS: u64 = 30_000;
const WATCH_RESTART_DELAY: Duration = Duration::from_secs(5);

/// Run the controller watch loop
///
/// Restarts the watch when the stream ends, until a shutdown signal arrives.
///
/// # Errors
///
/// Currently never fails; the signature leaves room for startup checks.
pub async fn run_watch_loop(
    app_versions: Api<AppVersion>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let backoff_ms = Arc::new(AtomicU64::new(WATCH_BACKOFF_START_MS));

    // Mark the server not ready on SIGTERM/SIGINT so no new traffic arrives
    let shutdown_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        }
        shutdown_state.is_ready.store(false, Ordering::Relaxed);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    let controller_config = controller::Config::default()
        .concurrency(reconciler.config.max_concurrent_reconciliations);

    loop {
        if !server_state.is_ready.load(Ordering::Relaxed) {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        info!("Starting controller watch loop...");
        let backoff = Arc::clone(&backoff_ms);
        let (reader, writer) = reflector::store();
        let spec_changes = watcher(app_versions.clone(), watcher::Config::default().any_semantic())
            .default_backoff()
            .reflect(writer)
            .applied_objects()
            .predicate_filter(predicates::generation);
        Controller::for_stream(spec_changes, reader)
            .with_config(controller_config.clone())
            .shutdown_on_signal()
            .run(reconcile, handle_reconciliation_error, Arc::clone(&reconciler))
            .filter_map(move |event| {
                let backoff = Arc::clone(&backoff);
                async move {
                    match &event {
                        Ok((obj, _)) => {
                            backoff.store(WATCH_BACKOFF_START_MS, Ordering::Relaxed);
                            debug!("Reconciled {}/{}", obj.namespace.as_deref().unwrap_or("default"), obj.name);
                            Some(event)
                        }
                        Err(e) => {
                            let error_string = format!("{e:?}");
                            handle_watch_stream_error(
                                &error_string,
                                &backoff,
                                WATCH_BACKOFF_MAX_MS,
                                WATCH_RESTART_DELAY,
                            )
                            .await
                            .map(|()| event)
                        }
                    }
                }
            })
            .for_each(|_| futures::future::ready(()))
            .await;

        if !server_state.is_ready.load(Ordering::Relaxed) {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            WATCH_RESTART_DELAY.as_secs()
        );
        tokio::time::sleep(WATCH_RESTART_DELAY).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{AppVersionSpec, KeptnAppVersion, LifecycleState};

    fn app(generation: i64) -> AppVersion {
        let mut app = KeptnAppVersion::new(
            "podtato-head-0.1.1",
            AppVersionSpec {
                app_name: "podtato-head".to_string(),
                version: "0.1.1".to_string(),
                ..Default::default()
            },
        );
        app.metadata.generation = Some(generation);
        app.metadata.resource_version = Some("1".to_string());
        app
    }

    #[test]
    fn test_status_writes_do_not_trigger_reconcile() {
        let before = app(1);
        let mut after = before.clone();
        after.metadata.resource_version = Some("2".to_string());
        after.status_mut().status = LifecycleState::Progressing;

        assert_eq!(predicates::generation(&before), predicates::generation(&after));
    }

    #[test]
    fn test_spec_change_triggers_reconcile() {
        let before = app(1);
        let mut after = app(2);
        after.spec.pre_deployment_tasks = vec!["notify".to_string()];

        assert_ne!(predicates::generation(&before), predicates::generation(&after));
    }
}
