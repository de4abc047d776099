//! # AppVersion
//!
//! The unit of orchestration: one version of an application moving through
//! its lifecycle phases.

use super::state::{CheckType, LifecycleState, Phase};
use super::status::AppVersionStatus;
use chrono::{DateTime, Utc};
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Carrier key of the version-wide (root) span
pub const APP_TRACE_KEY: &str = "App";

/// Kubernetes object names generated by the controller are kept within a DNS label
const MAX_GENERATED_NAME_LEN: usize = 63;

/// Desired state of an `AppVersion`
///
/// # Example
///
/// ```yaml
/// apiVersion: lifecycle.keptn.sh/v1alpha2
/// kind: KeptnAppVersion
/// metadata:
///   name: podtato-head-0.1.1
///   namespace: podtato-kubectl
/// spec:
///   appName: podtato-head
///   version: 0.1.1
///   previousVersion: 0.1.0
///   workloads:
///     - name: podtato-head-entry
///       version: 0.1.1
///   preDeploymentEvaluations:
///     - app-pre-deploy-eval
/// ```
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "KeptnAppVersion",
    group = "lifecycle.keptn.sh",
    version = "v1alpha2",
    namespaced,
    status = "AppVersionStatus",
    shortname = "kav",
    printcolumn = r#"{"name":"AppName", "type":"string", "jsonPath":".spec.appName"}, {"name":"Version", "type":"string", "jsonPath":".spec.version"}, {"name":"Phase", "type":"string", "jsonPath":".status.currentPhase"}, {"name":"Status", "type":"string", "jsonPath":".status.status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AppVersionSpec {
    pub app_name: String,
    pub version: String,
    #[serde(default)]
    pub previous_version: Option<String>,
    #[serde(default)]
    pub workloads: Vec<WorkloadRef>,
    #[serde(default)]
    pub pre_deployment_tasks: Vec<String>,
    #[serde(default)]
    pub post_deployment_tasks: Vec<String>,
    #[serde(default)]
    pub pre_deployment_evaluations: Vec<String>,
    #[serde(default)]
    pub post_deployment_evaluations: Vec<String>,
    /// Trace context of the operation that created this version
    #[serde(default)]
    pub trace_id: HashMap<String, String>,
}

/// Shorter name used throughout the crate
pub type AppVersion = KeptnAppVersion;

/// Workload that belongs to an application version
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadRef {
    pub name: String,
    pub version: String,
}

impl KeptnAppVersion {
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("unknown")
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or("default")
    }

    #[must_use]
    pub fn previous_version(&self) -> &str {
        self.spec.previous_version.as_deref().unwrap_or("")
    }

    /// Status, defaulted when the object has none yet
    #[must_use]
    pub fn status(&self) -> AppVersionStatus {
        self.status.clone().unwrap_or_default()
    }

    pub fn status_mut(&mut self) -> &mut AppVersionStatus {
        self.status.get_or_insert_with(AppVersionStatus::default)
    }

    #[must_use]
    pub fn overall_state(&self) -> LifecycleState {
        self.status.as_ref().map(|s| s.status).unwrap_or_default()
    }

    #[must_use]
    pub fn phase_state(&self, phase: Phase) -> LifecycleState {
        self.status
            .as_ref()
            .map(|s| s.phase_state(phase))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_start_time_set(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.start_time.is_some())
    }

    #[must_use]
    pub fn is_end_time_set(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.end_time.is_some())
    }

    /// Set the start time unless it is already set
    pub fn set_start_time(&mut self) {
        let status = self.status_mut();
        if status.start_time.is_none() {
            status.start_time = Some(Utc::now().to_rfc3339());
        }
    }

    /// Set the end time unless it is already set
    pub fn set_end_time(&mut self) {
        let status = self.status_mut();
        if status.end_time.is_none() {
            status.end_time = Some(Utc::now().to_rfc3339());
        }
    }

    /// Seconds between start and end time, when both are set and parse
    #[must_use]
    pub fn duration_seconds(&self) -> Option<f64> {
        let status = self.status.as_ref()?;
        let start = parse_time(status.start_time.as_deref()?)?;
        let end = parse_time(status.end_time.as_deref()?)?;
        #[allow(
            clippy::cast_precision_loss,
            reason = "durations are far below f64 integer precision"
        )]
        let seconds = (end - start).num_milliseconds() as f64 / 1000.0;
        Some(seconds)
    }

    /// Label values of the app duration histogram: app, version, previous version
    #[must_use]
    pub fn duration_metric_labels(&self) -> [&str; 3] {
        [
            self.spec.app_name.as_str(),
            self.spec.version.as_str(),
            self.previous_version(),
        ]
    }

    /// Label values of the app count counter: app, version, namespace, status
    #[must_use]
    pub fn count_metric_labels(&self) -> [String; 4] {
        [
            self.spec.app_name.clone(),
            self.spec.version.clone(),
            self.namespace().to_string(),
            self.overall_state().to_string(),
        ]
    }

    /// Span name for a phase; the root span is named after the resource
    #[must_use]
    pub fn span_name(&self, phase: Option<Phase>) -> String {
        match phase {
            Some(phase) => phase.short_name().to_string(),
            None => self.name().to_string(),
        }
    }

    /// Key of a phase's carrier in `status.phaseTraceIds`
    #[must_use]
    pub fn trace_key(phase: Option<Phase>) -> &'static str {
        phase.map_or(APP_TRACE_KEY, Phase::short_name)
    }

    /// Key identifying a live span across invocations of the same version
    #[must_use]
    pub fn span_key(&self, phase: Option<Phase>) -> String {
        format!(
            "{}.{}.{}.{}/{}.{}",
            self.spec
                .trace_id
                .get("traceparent")
                .map_or("", String::as_str),
            self.spec.app_name,
            self.spec.version,
            self.namespace(),
            self.name(),
            Self::trace_key(phase)
        )
    }

    /// Span attributes as key/value pairs
    #[must_use]
    pub fn span_attributes(&self) -> Vec<(&'static str, String)> {
        vec![
            ("keptn.deployment.app.name", self.spec.app_name.clone()),
            ("keptn.deployment.app.version", self.spec.version.clone()),
            ("keptn.deployment.app.namespace", self.namespace().to_string()),
        ]
    }

    /// Deterministic name of the task created for a task definition
    #[must_use]
    pub fn task_name(&self, check_type: CheckType, definition: &str) -> String {
        generate_name(&format!(
            "{}-{}-{}-{}",
            self.spec.app_name,
            self.spec.version,
            check_type.as_str(),
            definition
        ))
    }

    /// Name of the workload instance created for one of the app's workloads
    #[must_use]
    pub fn workload_instance_name(&self, workload: &WorkloadRef) -> String {
        format!("{}-{}-{}", self.spec.app_name, workload.name, workload.version)
    }

    /// Merge patch writing the whole status
    ///
    /// Carries `metadata.resourceVersion` so a stale write is rejected with a
    /// conflict. Trace carriers removed since they were persisted are sent as
    /// `null`, since a merge patch cannot otherwise delete map keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the status cannot be serialized.
    pub fn status_patch(&self) -> Result<serde_json::Value, serde_json::Error> {
        let mut status = serde_json::to_value(self.status())?;
        if let Some(serde_json::Value::Object(carriers)) = status.get_mut("phaseTraceIds") {
            let known = std::iter::once(APP_TRACE_KEY)
                .chain(Phase::ORDERED.iter().map(|p| p.short_name()));
            for key in known {
                carriers
                    .entry(key.to_string())
                    .or_insert(serde_json::Value::Null);
            }
        }
        Ok(serde_json::json!({
            "metadata": { "resourceVersion": self.metadata.resource_version },
            "status": status,
        }))
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Lowercase DNS label; over-long names are cut and suffixed with a stable hash
fn generate_name(raw: &str) -> String {
    let mut name: String = raw
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9' | '-') => c,
            _ => '-',
        })
        .collect();
    name = name.trim_matches('-').to_string();

    if name.len() > MAX_GENERATED_NAME_LEN {
        let digest = Sha256::digest(raw.as_bytes());
        let suffix: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
        name.truncate(MAX_GENERATED_NAME_LEN - suffix.len() - 1);
        name = format!("{}-{suffix}", name.trim_end_matches('-'));
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;

    fn app_version() -> AppVersion {
        let mut app = KeptnAppVersion::new(
            "podtato-head-0.1.1",
            AppVersionSpec {
                app_name: "podtato-head".to_string(),
                version: "0.1.1".to_string(),
                previous_version: Some("0.1.0".to_string()),
                ..Default::default()
            },
        );
        app.metadata = ObjectMeta {
            name: Some("podtato-head-0.1.1".to_string()),
            namespace: Some("demo".to_string()),
            resource_version: Some("7".to_string()),
            ..Default::default()
        };
        app
    }

    #[test]
    fn test_start_time_is_set_once() {
        let mut app = app_version();
        app.set_start_time();
        let first = app.status().start_time;
        std::thread::sleep(std::time::Duration::from_millis(5));
        app.set_start_time();
        assert!(first.is_some());
        assert_eq!(app.status().start_time, first);
    }

    #[test]
    fn test_end_time_is_set_once() {
        let mut app = app_version();
        assert!(!app.is_end_time_set());
        app.set_end_time();
        let first = app.status().end_time;
        std::thread::sleep(std::time::Duration::from_millis(5));
        app.set_end_time();
        assert!(app.is_end_time_set());
        assert_eq!(app.status().end_time, first);
    }

    #[test]
    fn test_duration_seconds() {
        let mut app = app_version();
        let status = app.status_mut();
        status.start_time = Some("2024-01-01T00:00:00Z".to_string());
        status.end_time = Some("2024-01-01T00:01:30Z".to_string());
        assert_eq!(app.duration_seconds(), Some(90.0));
    }

    #[test]
    fn test_task_name_is_deterministic_dns_label() {
        let app = app_version();
        let name = app.task_name(CheckType::PreDeployment, "Check_Entry");
        assert_eq!(name, "podtato-head-0-1-1-pre-check-entry");
        assert_eq!(name, app.task_name(CheckType::PreDeployment, "Check_Entry"));
    }

    #[test]
    fn test_task_name_long_definitions_are_shortened() {
        let app = app_version();
        let long = "x".repeat(100);
        let name = app.task_name(CheckType::PostDeployment, &long);
        assert!(name.len() <= MAX_GENERATED_NAME_LEN);
        assert_ne!(name, app.task_name(CheckType::PreDeployment, &long));
    }

    #[test]
    fn test_workload_instance_name() {
        let app = app_version();
        let workload = WorkloadRef {
            name: "entry".to_string(),
            version: "0.1.1".to_string(),
        };
        assert_eq!(
            app.workload_instance_name(&workload),
            "podtato-head-entry-0.1.1"
        );
    }

    #[test]
    fn test_status_patch_nulls_removed_carriers() {
        let mut app = app_version();
        app.status_mut()
            .phase_trace_ids
            .insert(APP_TRACE_KEY.to_string(), HashMap::new());

        let patch = app.status_patch().unwrap();

        assert_eq!(patch["metadata"]["resourceVersion"], "7");
        let carriers = &patch["status"]["phaseTraceIds"];
        assert!(carriers[APP_TRACE_KEY].is_object());
        assert!(carriers["AppDeploy"].is_null());
        assert!(carriers
            .as_object()
            .unwrap()
            .contains_key("AppPreDeployTasks"));
    }

    #[test]
    fn test_span_key_distinguishes_phases() {
        let app = app_version();
        assert_ne!(
            app.span_key(None),
            app.span_key(Some(Phase::PreDeploymentTasks))
        );
        assert_eq!(app.span_name(None), "podtato-head-0.1.1");
        assert_eq!(app.span_name(Some(Phase::Deployment)), "AppDeploy");
    }
}
