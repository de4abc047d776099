//! # Configuration
//!
//! Controller configuration loaded from the environment, optionally
//! overridden from the command line.

mod controller;

pub use controller::{ControllerConfig, LogFormat};
