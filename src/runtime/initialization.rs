//! # Initialization
//!
//! Controller initialization: metrics, HTTP server startup, Kubernetes client,
//! reconciler context and a startup summary of existing resources.
//!
//! Telemetry is set up earlier by `main`, before the async runtime starts.

use crate::config::ControllerConfig;
use crate::controller::events::KubeEventSink;
use crate::controller::reconciler::Reconciler;
use crate::controller::span::SpanHandler;
use crate::controller::store::{KubeStore, StateStore};
use crate::crd::AppVersion;
use crate::evaluation::KubeProviderResolver;
use crate::observability::ControllerMetrics;
use crate::provider::ProviderSettings;
use crate::server::{start_server, ServerState};
use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use kube::Client;
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    pub client: Client,
    /// API for the watched `KeptnAppVersion` resources
    pub app_versions: Api<AppVersion>,
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// # Errors
///
/// Returns an error if metrics cannot be registered, the HTTP server does not
/// come up, or the Kubernetes client cannot be created.
pub async fn initialize(config: ControllerConfig) -> Result<InitializationResult> {
    info!("Starting Lifecycle Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    let metrics = Arc::new(ControllerMetrics::new().context("Failed to register metrics")?);
    let server_state = Arc::new(ServerState::new(Arc::clone(&metrics)));

    // Start HTTP server for metrics and probes and wait until it is bound
    let server_state_clone = Arc::clone(&server_state);
    let server_port = config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let app_versions: Api<AppVersion> = match config.watch_namespace.as_deref() {
        Some(namespace) => {
            info!("Watching KeptnAppVersions in namespace {}", namespace);
            Api::namespaced(client.clone(), namespace)
        }
        None => Api::all(client.clone()),
    };

    let store: Arc<dyn StateStore> = Arc::new(KubeStore::new(client.clone()));
    let settings = ProviderSettings::new(
        config.provider_http_timeout(),
        config.dynatrace_query_window.clone(),
    )
    .context("Failed to build metrics provider HTTP client")?;
    let resolver = Arc::new(KubeProviderResolver::new(Arc::clone(&store), settings));
    let events = Arc::new(KubeEventSink::new(client.clone()));

    let reconciler = Arc::new(Reconciler::new(
        store,
        resolver,
        events,
        Arc::new(SpanHandler::default()),
        metrics,
        config,
    ));

    log_existing_resources(&app_versions).await;

    info!("Controller initialized, starting watch loop...");
    Ok(InitializationResult {
        client,
        app_versions,
        reconciler,
        server_state,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &ServerState,
    server_handle: &tokio::task::JoinHandle<()>,
    config: &ControllerConfig,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(config.server_startup_timeout_secs);
    let poll_interval = Duration::from_millis(config.server_poll_interval_ms);
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }
        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }
        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Log existing app versions per namespace, or warn if the CRD is not queryable
async fn log_existing_resources(app_versions: &Api<AppVersion>) {
    let list = match app_versions.list(&ListParams::default()).await {
        Ok(list) => list,
        Err(e) => {
            warn!(
                "KeptnAppVersion CRD is not queryable yet ({}); the watch will retry",
                e
            );
            return;
        }
    };

    let mut by_namespace: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for item in &list.items {
        by_namespace
            .entry(item.namespace().to_string())
            .or_default()
            .push(format!("{} ({})", item.name(), item.overall_state()));
    }

    info!("Lifecycle Controller - Startup Resource Summary");
    info!("Total KeptnAppVersions: {}", list.items.len());
    for (namespace, names) in &by_namespace {
        info!("  {}: {}", namespace, names.join(", "));
    }
}
