//! # Runtime
//!
//! Controller runtime: initialization, the watch loop and its error policy.

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use initialization::{initialize, InitializationResult};
pub use watch_loop::run_watch_loop;
