//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use lifecycle_controller::prelude::*;
//! ```

// CRD types - most commonly used
pub use crate::crd::*;

// Seams the reconciler is built from
pub use crate::controller::events::{EventSink, LifecycleEvent};
pub use crate::controller::span::{PhaseSpan, SpanHandler};
pub use crate::controller::store::{StateStore, StoreError};
pub use crate::evaluation::{ProviderResolver, ResolvedProvider};
pub use crate::provider::{Credentials, MetricsProvider, ProviderError, QueryProvider};

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{reconcile, Directive, Reconciler, ReconcilerError};

pub use crate::config::ControllerConfig;
pub use crate::observability::ControllerMetrics;
