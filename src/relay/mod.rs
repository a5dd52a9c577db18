//! TURN relay health scoring and selection
//!
//! Data flows selector -> cache -> evaluator -> (exposition parser ->
//! normalizer -> traffic tracker), and scored results flow back up.

pub mod cache;
pub mod descriptor;
pub mod exposition;
pub mod health;
pub mod normalizer;
pub mod selector;
pub mod traffic;

pub use cache::HealthCache;
pub use descriptor::ServerDescriptor;
pub use health::{EvaluationResult, Evaluate, HealthEvaluator, MetricSnapshot};
pub use selector::{RelaySelector, SelectionResult};
pub use traffic::{TrafficSource, TrafficTracker};
