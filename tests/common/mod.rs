//! Common test utilities for reconciler tests
//!
//! In-memory stand-ins for the Kubernetes API, the event recorder and the
//! metrics providers, plus builders for the resources the controller reads.

#![allow(dead_code, reason = "each test binary uses a subset of the helpers")]

use async_trait::async_trait;
use lifecycle_controller::config::ControllerConfig;
use lifecycle_controller::controller::events::{EventSink, LifecycleEvent};
use lifecycle_controller::controller::span::SpanHandler;
use lifecycle_controller::controller::store::{StateStore, StoreError};
use lifecycle_controller::crd::{
    AppVersion, AppVersionSpec, EvaluationDefinition, EvaluationDefinitionSpec, EvaluationProvider,
    KeptnAppVersion, KeptnEvaluationDefinition, KeptnWorkloadInstance, LifecycleState, Objective,
    Task, TaskStatus, WorkloadInstance, WorkloadInstanceSpec, WorkloadInstanceStatus, WorkloadRef,
};
use lifecycle_controller::evaluation::{ProviderResolver, ResolveError, ResolvedProvider};
use lifecycle_controller::observability::ControllerMetrics;
use lifecycle_controller::provider::{Credentials, ProviderError, QueryProvider};
use lifecycle_controller::controller::reconciler::Reconciler;
use opentelemetry::global::BoxedTracer;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const NAMESPACE: &str = "demo";

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

#[derive(Default)]
struct Objects {
    app_versions: HashMap<Key, AppVersion>,
    tasks: HashMap<Key, Task>,
    workloads: HashMap<Key, WorkloadInstance>,
    definitions: HashMap<Key, EvaluationDefinition>,
    providers: HashMap<Key, EvaluationProvider>,
    secrets: HashMap<(String, String, String), String>,
    next_resource_version: u64,
    status_writes: usize,
}

impl Objects {
    fn bump(&mut self) -> String {
        self.next_resource_version += 1;
        self.next_resource_version.to_string()
    }
}

/// State store backed by hash maps
///
/// Status writes check `resourceVersion` the way the API server does.
#[derive(Default)]
pub struct InMemoryStore {
    objects: Mutex<Objects>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store an app version and return it with its assigned resource version
    pub fn insert_app_version(&self, mut app: AppVersion) -> AppVersion {
        let mut objects = self.objects.lock().unwrap();
        app.metadata.resource_version = Some(objects.bump());
        objects
            .app_versions
            .insert(key(app.namespace(), app.name()), app.clone());
        app
    }

    pub fn app_version(&self, name: &str) -> AppVersion {
        self.objects
            .lock()
            .unwrap()
            .app_versions
            .get(&key(NAMESPACE, name))
            .cloned()
            .unwrap_or_else(|| panic!("app version {name} not stored"))
    }

    /// Simulate a write by another client
    pub fn touch_app_version(&self, name: &str) {
        let mut objects = self.objects.lock().unwrap();
        let rv = objects.bump();
        if let Some(app) = objects.app_versions.get_mut(&key(NAMESPACE, name)) {
            app.metadata.resource_version = Some(rv);
        }
    }

    /// Simulate deletion of the app version
    pub fn remove_app_version(&self, name: &str) {
        self.objects
            .lock()
            .unwrap()
            .app_versions
            .remove(&key(NAMESPACE, name));
    }

    pub fn status_writes(&self) -> usize {
        self.objects.lock().unwrap().status_writes
    }

    pub fn task_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .tasks
            .keys()
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Report a task state the way the task runner would
    pub fn set_task_state(&self, name: &str, state: LifecycleState) {
        let mut objects = self.objects.lock().unwrap();
        let task = objects
            .tasks
            .get_mut(&key(NAMESPACE, name))
            .unwrap_or_else(|| panic!("task {name} not created"));
        task.status = Some(TaskStatus {
            status: state,
            start_time: Some("2026-10-15T10:00:00Z".to_string()),
            end_time: state
                .is_completed()
                .then(|| "2026-10-15T10:01:00Z".to_string()),
        });
    }

    pub fn insert_workload_instance(&self, instance: WorkloadInstance) {
        self.objects
            .lock()
            .unwrap()
            .workloads
            .insert(key(NAMESPACE, instance.metadata.name.as_deref().unwrap_or_default()), instance);
    }

    pub fn insert_definition(&self, definition: EvaluationDefinition) {
        self.objects.lock().unwrap().definitions.insert(
            key(NAMESPACE, definition.metadata.name.as_deref().unwrap_or_default()),
            definition,
        );
    }

    pub fn insert_provider(&self, provider: EvaluationProvider) {
        self.objects.lock().unwrap().providers.insert(
            key(NAMESPACE, provider.metadata.name.as_deref().unwrap_or_default()),
            provider,
        );
    }

    pub fn insert_secret(&self, name: &str, secret_key: &str, value: &str) {
        self.objects.lock().unwrap().secrets.insert(
            (NAMESPACE.to_string(), name.to_string(), secret_key.to_string()),
            value.to_string(),
        );
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn get_app_version(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<AppVersion>, StoreError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .app_versions
            .get(&key(namespace, name))
            .cloned())
    }

    async fn list_app_versions(&self, namespace: &str) -> Result<Vec<AppVersion>, StoreError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .app_versions
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, app)| app.clone())
            .collect())
    }

    async fn update_app_version_status(&self, app: &AppVersion) -> Result<AppVersion, StoreError> {
        let mut objects = self.objects.lock().unwrap();
        let id = format!("{}/{}", app.namespace(), app.name());
        let stored_rv = objects
            .app_versions
            .get(&key(app.namespace(), app.name()))
            .ok_or_else(|| StoreError::NotFound(id.clone()))?
            .metadata
            .resource_version
            .clone();
        if stored_rv != app.metadata.resource_version {
            return Err(StoreError::Conflict(id));
        }

        let rv = objects.bump();
        objects.status_writes += 1;
        let stored = objects
            .app_versions
            .get_mut(&key(app.namespace(), app.name()))
            .ok_or(StoreError::NotFound(id))?;
        stored.status = app.status.clone();
        stored.metadata.resource_version = Some(rv);
        Ok(stored.clone())
    }

    async fn get_task(&self, namespace: &str, name: &str) -> Result<Option<Task>, StoreError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .tasks
            .get(&key(namespace, name))
            .cloned())
    }

    async fn create_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut objects = self.objects.lock().unwrap();
        let namespace = task.metadata.namespace.clone().unwrap_or_default();
        let name = task.metadata.name.clone().unwrap_or_default();
        if objects.tasks.contains_key(&key(&namespace, &name)) {
            return Err(StoreError::AlreadyExists(format!("{namespace}/{name}")));
        }
        objects.tasks.insert(key(&namespace, &name), task.clone());
        Ok(())
    }

    async fn get_workload_instance(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<WorkloadInstance>, StoreError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .workloads
            .get(&key(namespace, name))
            .cloned())
    }

    async fn get_evaluation_definition(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<EvaluationDefinition>, StoreError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .definitions
            .get(&key(namespace, name))
            .cloned())
    }

    async fn get_evaluation_provider(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<EvaluationProvider>, StoreError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .providers
            .get(&key(namespace, name))
            .cloned())
    }

    async fn get_secret_value(
        &self,
        namespace: &str,
        name: &str,
        secret_key: &str,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .secrets
            .get(&(namespace.to_string(), name.to_string(), secret_key.to_string()))
            .cloned())
    }
}

/// Event sink that keeps every event in memory
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingEventSink {
    pub fn reasons(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.reason.clone())
            .collect()
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, reason: &str) -> usize {
        self.reasons().iter().filter(|r| r.as_str() == reason).count()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn publish(&self, _app: &AppVersion, event: LifecycleEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Provider answering every query with the same value
pub struct FixedValueProvider {
    value: Mutex<String>,
    queries: AtomicUsize,
}

impl FixedValueProvider {
    pub fn new(value: &str) -> Arc<Self> {
        Arc::new(Self {
            value: Mutex::new(value.to_string()),
            queries: AtomicUsize::new(0),
        })
    }

    pub fn set_value(&self, value: &str) {
        *self.value.lock().unwrap() = value.to_string();
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryProvider for FixedValueProvider {
    fn name(&self) -> &'static str {
        "prometheus"
    }

    async fn evaluate_query(
        &self,
        _query: &str,
        _target_server: &str,
        _credentials: Option<&Credentials>,
    ) -> Result<String, ProviderError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.value.lock().unwrap().clone())
    }
}

/// Resolves every provider name to the same backend
pub struct StaticResolver {
    provider: Arc<FixedValueProvider>,
}

impl StaticResolver {
    pub fn new(provider: Arc<FixedValueProvider>) -> Arc<Self> {
        Arc::new(Self { provider })
    }
}

#[async_trait]
impl ProviderResolver for StaticResolver {
    async fn resolve(
        &self,
        _namespace: &str,
        _provider: &str,
    ) -> Result<ResolvedProvider, ResolveError> {
        Ok(ResolvedProvider {
            provider: Arc::clone(&self.provider) as Arc<dyn QueryProvider>,
            target_server: "http://prometheus.monitoring:9090".to_string(),
            credentials: None,
        })
    }
}

/// Everything a reconciler test needs to look at
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub events: Arc<RecordingEventSink>,
    pub provider: Arc<FixedValueProvider>,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    /// Reconciler whose provider answers every query with `value`
    pub fn new(value: &str) -> Self {
        let store = InMemoryStore::new();
        let provider = FixedValueProvider::new(value);
        Self::with_parts(store, provider)
    }

    /// A second controller process sharing the same cluster state
    pub fn restarted(&self) -> Self {
        Self::with_parts(Arc::clone(&self.store), Arc::clone(&self.provider))
    }

    fn with_parts(store: Arc<InMemoryStore>, provider: Arc<FixedValueProvider>) -> Self {
        let events = Arc::new(RecordingEventSink::default());
        let resolver = StaticResolver::new(Arc::clone(&provider));
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&store) as Arc<dyn StateStore>,
            resolver,
            Arc::clone(&events) as Arc<dyn EventSink>,
            Arc::new(test_span_handler()),
            Arc::new(ControllerMetrics::new().unwrap()),
            ControllerConfig::default(),
        ));
        Self {
            store,
            events,
            provider,
            reconciler,
        }
    }
}

pub fn test_span_handler() -> SpanHandler {
    let provider = SdkTracerProvider::builder().build();
    SpanHandler::new(BoxedTracer::new(Box::new(provider.tracer("test"))))
}

/// `podtato-head` at `version`, with no tasks, evaluations or workloads
pub fn app_version(version: &str) -> AppVersion {
    let mut app = KeptnAppVersion::new(
        &format!("podtato-head-{version}"),
        AppVersionSpec {
            app_name: "podtato-head".to_string(),
            version: version.to_string(),
            ..Default::default()
        },
    );
    app.metadata.namespace = Some(NAMESPACE.to_string());
    app
}

pub fn evaluation_definition(name: &str, objectives: &[(&str, &str, &str)]) -> EvaluationDefinition {
    let mut definition = KeptnEvaluationDefinition::new(
        name,
        EvaluationDefinitionSpec {
            source: "prometheus".to_string(),
            objectives: objectives
                .iter()
                .map(|(name, query, target)| Objective {
                    name: (*name).to_string(),
                    query: (*query).to_string(),
                    evaluation_target: (*target).to_string(),
                    provider: None,
                })
                .collect(),
            ..Default::default()
        },
    );
    definition.metadata.namespace = Some(NAMESPACE.to_string());
    definition
}

pub fn workload_instance(app: &AppVersion, workload: &WorkloadRef, state: LifecycleState) -> WorkloadInstance {
    let mut instance = KeptnWorkloadInstance::new(
        &app.workload_instance_name(workload),
        WorkloadInstanceSpec {
            app: app.spec.app_name.clone(),
            workload_name: workload.name.clone(),
            version: workload.version.clone(),
        },
    );
    instance.metadata.namespace = Some(NAMESPACE.to_string());
    instance.status = Some(WorkloadInstanceStatus { status: state });
    instance
}
