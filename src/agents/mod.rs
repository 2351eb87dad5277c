//! Per-agent state machines
//!
//! Agents are the leaves of the simulation: each one is a small state
//! machine owned by exactly one sector. Agents never touch the event bus or
//! stocks directly; they report what they produced and consumed, and their
//! sector turns that into ledger flows and events.

pub mod assembly_robot;
pub mod fuel_generator;
pub mod isru;
pub mod lifecycle;
pub mod power;
pub mod printing_robot;
pub mod rocket;
pub mod science_rover;

pub use lifecycle::{AgentHealth, AgentState, Lifecycle};
