//! # Controller
//!
//! Core controller modules for the lifecycle controller.
//!
//! - `backoff`: Fibonacci backoff for failed reconciliations
//! - `events`: Kubernetes events about phase transitions
//! - `reconciler`: Phase orchestration
//! - `span`: OpenTelemetry spans bound to app versions and phases
//! - `store`: Typed access to the Kubernetes objects the controller uses

pub mod backoff;
pub mod events;
pub mod reconciler;
pub mod span;
pub mod store;
