//! World orchestrator - builds the system and runs the step pipeline

pub mod builder;
pub mod mutator;
pub mod orchestrator;

pub use builder::build_world;
pub use mutator::WorldMutator;
pub use orchestrator::{ScheduledEvent, StepReport, World, WorldConfig};
