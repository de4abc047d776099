//! # Span Handler
//!
//! Keeps OpenTelemetry spans coherent across reconcile invocations.
//!
//! A phase can take many invocations to finish, and the process may restart
//! in between. Live spans are cached in memory under the app version's span
//! key. Each new span's W3C trace context is also written into
//! `status.phaseTraceIds`, so a later invocation, possibly in a new process,
//! can resume under the same trace.

use crate::crd::{AppVersion, Phase};
use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{Span as _, SpanKind, Status, TraceContextExt, TraceId, Tracer};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

const TRACER_NAME: &str = "keptn/lifecycle-controller/app";

/// Handle to a live span
#[derive(Debug, Clone)]
pub struct PhaseSpan {
    cx: Context,
}

impl PhaseSpan {
    /// Context carrying the span, for use as a parent
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.cx
    }

    #[must_use]
    pub fn trace_id(&self) -> TraceId {
        self.cx.span().span_context().trace_id()
    }

    pub fn add_event(&self, name: &str, attributes: Vec<KeyValue>) {
        self.cx.span().add_event(name.to_string(), attributes);
    }

    pub fn set_ok(&self) {
        self.cx.span().set_status(Status::Ok);
    }

    pub fn set_error(&self, message: &str) {
        self.cx.span().set_status(Status::error(message.to_string()));
    }

    pub fn end(&self) {
        self.cx.span().end();
    }
}

/// Binds spans to app versions and phases
pub struct SpanHandler {
    tracer: BoxedTracer,
    propagator: TraceContextPropagator,
    spans: Mutex<HashMap<String, Context>>,
}

impl std::fmt::Debug for SpanHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpanHandler")
            .field("bound", &self.bound_count())
            .finish_non_exhaustive()
    }
}

impl Default for SpanHandler {
    fn default() -> Self {
        Self::new(global::tracer(TRACER_NAME))
    }
}

impl SpanHandler {
    #[must_use]
    pub fn new(tracer: BoxedTracer) -> Self {
        Self {
            tracer,
            propagator: TraceContextPropagator::new(),
            spans: Mutex::new(HashMap::new()),
        }
    }

    fn spans(&self) -> std::sync::MutexGuard<'_, HashMap<String, Context>> {
        self.spans.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Context of the operation that created the app version, from `spec.traceId`
    #[must_use]
    pub fn origin_context(&self, app: &AppVersion) -> Context {
        self.propagator.extract(&app.spec.trace_id)
    }

    /// Return the live span for `phase` (`None` is the root span), opening it if needed
    ///
    /// A carrier persisted by an earlier invocation makes the new span a
    /// continuation of the stored trace. Otherwise the span starts under
    /// `parent` and its carrier is stored in the status.
    pub fn resume(&self, app: &mut AppVersion, phase: Option<Phase>, parent: &Context) -> PhaseSpan {
        let key = app.span_key(phase);
        let mut spans = self.spans();
        let carrier_key = AppVersion::trace_key(phase);
        if let Some(cx) = spans.get(&key) {
            // The carrier is lost when the write that carried it conflicted
            if !app.status().phase_trace_ids.contains_key(carrier_key) {
                self.inject(app, carrier_key, cx);
            }
            return PhaseSpan { cx: cx.clone() };
        }

        let stored = app.status().phase_trace_ids.get(carrier_key).cloned();
        let parent_cx = match &stored {
            Some(carrier) => self.propagator.extract_with_context(parent, carrier),
            None => parent.clone(),
        };

        let span = self
            .tracer
            .span_builder(app.span_name(phase))
            .with_kind(SpanKind::Consumer)
            .with_attributes(
                app.span_attributes()
                    .into_iter()
                    .map(|(k, v)| KeyValue::new(k, v)),
            )
            .start_with_context(&self.tracer, &parent_cx);
        let cx = parent_cx.with_span(span);

        if stored.is_none() {
            self.inject(app, carrier_key, &cx);
        }

        debug!("Bound span {}", key);
        spans.insert(key, cx.clone());
        PhaseSpan { cx }
    }

    fn inject(&self, app: &mut AppVersion, carrier_key: &str, cx: &Context) {
        let mut carrier = HashMap::new();
        self.propagator.inject_context(cx, &mut carrier);
        app.status_mut()
            .phase_trace_ids
            .insert(carrier_key.to_string(), carrier);
    }

    /// Forget the span for `phase`, ending it if still open, and drop its carrier
    pub fn unbind(&self, app: &mut AppVersion, phase: Option<Phase>) {
        if let Some(cx) = self.spans().remove(&app.span_key(phase)) {
            cx.span().end();
        }
        if let Some(status) = app.status.as_mut() {
            status.phase_trace_ids.remove(AppVersion::trace_key(phase));
        }
    }

    /// Set the span's final status, end it and unbind it
    pub fn close(&self, app: &mut AppVersion, phase: Option<Phase>, result: Result<(), &str>) {
        if let Some(cx) = self.spans().remove(&app.span_key(phase)) {
            let span = cx.span();
            match result {
                Ok(()) => span.set_status(Status::Ok),
                Err(message) => span.set_status(Status::error(message.to_string())),
            }
            span.end();
        }
        self.unbind(app, phase);
    }

    /// End and drop every live span of a deleted app version
    pub fn forget(&self, namespace: &str, name: &str) {
        let marker = format!(".{namespace}/{name}.");
        self.spans().retain(|key, cx| {
            if key.contains(&marker) {
                cx.span().end();
                debug!("Dropped span {}", key);
                return false;
            }
            true
        });
    }

    #[must_use]
    pub fn is_bound(&self, app: &AppVersion, phase: Option<Phase>) -> bool {
        self.spans().contains_key(&app.span_key(phase))
    }

    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.spans().len()
    }
}
