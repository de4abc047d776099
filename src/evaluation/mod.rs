//! # Evaluation
//!
//! Metric-based pass/fail decisions for the evaluation phases.
//!
//! - `comparator`: directional threshold checks
//! - `engine`: objective evaluation and aggregation
//! - `resolver`: provider lookup from cluster resources

pub mod comparator;
pub mod engine;
pub mod resolver;

pub use comparator::{compare, ComparatorError};
pub use engine::{evaluate, EngineError, EvaluationOutcome, EvaluationVerdict};
pub use resolver::{KubeProviderResolver, ProviderResolver, ResolveError, ResolvedProvider};
