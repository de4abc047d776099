//! # Reconciler
//!
//! Core reconciliation logic for `KeptnAppVersion` resources.
//!
//! ## Reconciliation Flow
//!
//! 1. Read the latest version of the app version from the store
//! 2. Deprecate it if a newer version of the same app supersedes it
//! 3. Otherwise advance it through its phases:
//!    - Pre-deployment tasks
//!    - Pre-deployment evaluations
//!    - Deployment (workload instances)
//!    - Post-deployment tasks
//!    - Post-deployment evaluations
//! 4. Persist the status after every transition and requeue while a phase runs

mod deprecation;
pub mod duration;
mod evaluations;
mod phase;
pub mod reconcile;
mod tasks;
pub mod types;
mod workloads;

pub use reconcile::reconcile;
pub use types::{Directive, Reconciler, ReconcilerError};
