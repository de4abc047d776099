//! Lifecycle Controller Library
//!
//! This library provides the core functionality for the Lifecycle Controller.
//! Tests are included in the module files and under `tests/`.
//!
//! ## Quick Start
//!
//! ```rust
//! use lifecycle_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod evaluation;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod runtime;
pub mod server;
