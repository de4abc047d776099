//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `lifecycle_app_duration_seconds` - Time from start to end of an app version, labelled by app, version and previous version
//! - `lifecycle_app_count_total` - App versions that reached a terminal state, labelled by app, version, namespace and status
//! - `lifecycle_reconciliations_total` - Total number of reconciliations
//! - `lifecycle_reconciliation_errors_total` - Total number of reconciliation errors
//! - `lifecycle_reconciliation_duration_seconds` - Duration of reconciliation operations
//! - `lifecycle_evaluations_total` - Objective evaluations, labelled by provider and resulting state

use crate::crd::AppVersion;
use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use tracing::debug;

/// All controller metrics, registered in their own registry
#[derive(Debug, Clone)]
pub struct ControllerMetrics {
    registry: Registry,
    app_duration: HistogramVec,
    app_count: IntCounterVec,
    reconciliations_total: IntCounter,
    reconciliation_errors_total: IntCounter,
    reconciliation_duration: Histogram,
    evaluations_total: IntCounterVec,
}

impl ControllerMetrics {
    /// Create and register all metrics
    ///
    /// # Errors
    ///
    /// Returns an error if a metric cannot be created or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let app_duration = HistogramVec::new(
            HistogramOpts::new(
                "lifecycle_app_duration_seconds",
                "Duration of an app version from start to end in seconds",
            )
            .buckets(vec![
                1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0,
            ]),
            &["app", "version", "previous_version"],
        )?;

        let app_count = IntCounterVec::new(
            Opts::new(
                "lifecycle_app_count_total",
                "Number of app versions that reached a terminal state",
            ),
            &["app", "version", "namespace", "status"],
        )?;

        let reconciliations_total = IntCounter::new(
            "lifecycle_reconciliations_total",
            "Total number of reconciliations",
        )?;

        let reconciliation_errors_total = IntCounter::new(
            "lifecycle_reconciliation_errors_total",
            "Total number of reconciliation errors",
        )?;

        let reconciliation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "lifecycle_reconciliation_duration_seconds",
                "Duration of reconciliation in seconds",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        )?;

        let evaluations_total = IntCounterVec::new(
            Opts::new(
                "lifecycle_evaluations_total",
                "Total number of objective evaluations",
            ),
            &["provider", "status"],
        )?;

        registry.register(Box::new(app_duration.clone()))?;
        registry.register(Box::new(app_count.clone()))?;
        registry.register(Box::new(reconciliations_total.clone()))?;
        registry.register(Box::new(reconciliation_errors_total.clone()))?;
        registry.register(Box::new(reconciliation_duration.clone()))?;
        registry.register(Box::new(evaluations_total.clone()))?;

        Ok(Self {
            registry,
            app_duration,
            app_count,
            reconciliations_total,
            reconciliation_errors_total,
            reconciliation_duration,
            evaluations_total,
        })
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record the start-to-end duration of a finished app version
    pub fn observe_app_duration(&self, app: &AppVersion) {
        if let Some(seconds) = app.duration_seconds() {
            self.app_duration
                .with_label_values(&app.duration_metric_labels())
                .observe(seconds);
        } else {
            debug!("No complete start/end time on {}, skipping duration sample", app.name());
        }
    }

    /// Count an app version that reached a terminal state
    pub fn increment_app_count(&self, app: &AppVersion) {
        let labels = app.count_metric_labels();
        let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
        self.app_count.with_label_values(&labels).inc();
    }

    pub fn increment_reconciliations(&self) {
        self.reconciliations_total.inc();
    }

    pub fn increment_reconciliation_errors(&self) {
        self.reconciliation_errors_total.inc();
    }

    pub fn observe_reconciliation_duration(&self, duration: f64) {
        self.reconciliation_duration.observe(duration);
    }

    pub fn record_evaluation(&self, provider: &str, status: &str) {
        self.evaluations_total
            .with_label_values(&[provider, status])
            .inc();
    }

    /// Number of duration samples recorded for the given labels
    #[must_use]
    pub fn app_duration_sample_count(&self, labels: &[&str]) -> u64 {
        self.app_duration.with_label_values(labels).get_sample_count()
    }

    #[must_use]
    pub fn app_count(&self, labels: &[&str]) -> u64 {
        self.app_count.with_label_values(labels).get()
    }

    #[must_use]
    pub fn reconciliations(&self) -> u64 {
        self.reconciliations_total.get()
    }

    #[must_use]
    pub fn reconciliation_errors(&self) -> u64 {
        self.reconciliation_errors_total.get()
    }

    #[must_use]
    pub fn evaluations(&self, provider: &str, status: &str) -> u64 {
        self.evaluations_total
            .with_label_values(&[provider, status])
            .get()
    }

    /// Render all metrics in the Prometheus text format
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{AppVersionSpec, KeptnAppVersion, LifecycleState};

    fn finished_app() -> AppVersion {
        let mut app = KeptnAppVersion::new(
            "podtato-head-0.1.1",
            AppVersionSpec {
                app_name: "podtato-head".to_string(),
                version: "0.1.1".to_string(),
                previous_version: Some("0.1.0".to_string()),
                ..Default::default()
            },
        );
        app.metadata.namespace = Some("demo".to_string());
        let status = app.status_mut();
        status.start_time = Some("2024-01-01T00:00:00Z".to_string());
        status.end_time = Some("2024-01-01T00:00:30Z".to_string());
        status.status = LifecycleState::Succeeded;
        app
    }

    #[test]
    fn test_observe_app_duration() {
        let metrics = ControllerMetrics::new().unwrap();
        let app = finished_app();

        metrics.observe_app_duration(&app);

        assert_eq!(
            metrics.app_duration_sample_count(&["podtato-head", "0.1.1", "0.1.0"]),
            1
        );
    }

    #[test]
    fn test_app_duration_needs_both_times() {
        let metrics = ControllerMetrics::new().unwrap();
        let mut app = finished_app();
        app.status_mut().end_time = None;

        metrics.observe_app_duration(&app);

        assert_eq!(
            metrics.app_duration_sample_count(&["podtato-head", "0.1.1", "0.1.0"]),
            0
        );
    }

    #[test]
    fn test_increment_app_count() {
        let metrics = ControllerMetrics::new().unwrap();
        let app = finished_app();

        metrics.increment_app_count(&app);
        metrics.increment_app_count(&app);

        assert_eq!(
            metrics.app_count(&["podtato-head", "0.1.1", "demo", "Succeeded"]),
            2
        );
    }

    #[test]
    fn test_reconciliation_counters() {
        let metrics = ControllerMetrics::new().unwrap();
        metrics.increment_reconciliations();
        metrics.increment_reconciliation_errors();
        metrics.observe_reconciliation_duration(0.2);
        assert_eq!(metrics.reconciliations(), 1);
        assert_eq!(metrics.reconciliation_errors(), 1);
    }

    #[test]
    fn test_gather_renders_text_format() {
        let metrics = ControllerMetrics::new().unwrap();
        metrics.record_evaluation("prometheus", "Succeeded");
        let text = metrics.gather().unwrap();
        assert!(text.contains("lifecycle_evaluations_total"));
        assert!(text.contains("provider=\"prometheus\""));
    }
}
