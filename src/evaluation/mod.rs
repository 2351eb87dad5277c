//! Evaluation engine - metric aggregation and goal scoring

pub mod engine;
pub mod goals;
pub mod metrics;

pub use engine::{EvaluationEngine, EvaluationResult, GoalScore};
pub use goals::{Goal, GoalDirection, GoalKind, GoalStatus};
pub use metrics::{MetricDefinition, Polarity};
