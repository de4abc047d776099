//! # Lifecycle Controller
//!
//! A Kubernetes controller that drives `KeptnAppVersion` resources through
//! pre-deployment tasks and evaluations, the deployment itself, and
//! post-deployment tasks and evaluations.
//!
//! ## Overview
//!
//! 1. **Tasks** - Creates a task per task definition and waits for the task runner
//! 2. **Evaluations** - Queries Prometheus or Dynatrace and checks each objective's threshold
//! 3. **Deployment** - Waits for every workload instance of the version to roll out
//! 4. **Tracing** - Records one span per version and per phase, resumable across restarts
//! 5. **Metrics** - Exposes app durations and counts on `/metrics`
//!
//! Configuration comes from environment variables (see `ControllerConfig`);
//! the flags below override the most common ones.

use anyhow::{Context, Result};
use clap::Parser;
use lifecycle_controller::config::{ControllerConfig, LogFormat};
use lifecycle_controller::observability;
use lifecycle_controller::runtime::{initialize, run_watch_loop};
use tracing::{error, info};

/// Keptn lifecycle controller
#[derive(Debug, Parser)]
#[command(name = "lifecycle-controller", version, about, long_about = None)]
struct Cli {
    /// Port of the metrics and probe server
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Only watch this namespace (default: all namespaces)
    #[arg(long, env = "WATCH_NAMESPACE")]
    namespace: Option<String>,

    /// Log format: text or json
    #[arg(long, env = "LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Disable OTLP span export
    #[arg(long)]
    no_tracing: bool,
}

impl Cli {
    fn apply(self, config: &mut ControllerConfig) {
        if let Some(port) = self.metrics_port {
            config.metrics_port = port;
        }
        if let Some(namespace) = self.namespace.filter(|ns| !ns.trim().is_empty()) {
            config.watch_namespace = Some(namespace);
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if self.no_tracing {
            config.enable_tracing = false;
        }
    }
}

fn main() -> Result<()> {
    let mut config = ControllerConfig::from_env();
    Cli::parse().apply(&mut config);

    // Configure rustls crypto provider before anything opens a TLS connection
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    // The OTLP exporter uses a blocking HTTP client, so it is built before the runtime
    let otel_tracer_provider =
        observability::init_otel(&config).context("Failed to initialize OpenTelemetry")?;
    observability::init_tracing(&config, otel_tracer_provider.as_ref())
        .context("Failed to initialize tracing subscriber")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let result = runtime.block_on(async move {
        let init = initialize(config).await?;
        run_watch_loop(init.app_versions, init.reconciler, init.server_state).await
    });

    if let Err(e) = &result {
        error!("Controller exited with error: {:?}", e);
    } else {
        info!("Controller exited");
    }
    drop(runtime);
    observability::shutdown_otel(otel_tracer_provider);
    result
}
