//! Policy engine - adaptive rules that steer sectors toward goals
//!
//! Policies close the control loop: they read the evaluation result of the
//! previous step's metrics and mutate sector parameters through a narrowed
//! [`WorldMutator`](crate::world::WorldMutator) handle. They never read
//! stocks directly. Effects applied in step `t` are visible to sectors in
//! the same step; policies observe them through the next evaluation.

pub mod dust;
pub mod maintenance;
pub mod science_growth;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::Step;
use crate::evaluation::EvaluationResult;
use crate::events::Event;
use crate::world::WorldMutator;

pub use dust::DustThrottlePolicy;
pub use maintenance::MaintenancePolicy;
pub use science_growth::ScienceGrowthPolicy;

/// Uniform policy contract as a tagged variant.
///
/// Each variant carries its own parameters and state; dispatch lives here so
/// the engine, snapshots, and the store all see one closed type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Policy {
    DustThrottle(DustThrottlePolicy),
    ScienceGrowth(ScienceGrowthPolicy),
    Maintenance(MaintenancePolicy),
}

impl Policy {
    pub fn id(&self) -> &str {
        match self {
            Policy::DustThrottle(p) => &p.id,
            Policy::ScienceGrowth(p) => &p.id,
            Policy::Maintenance(p) => &p.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Policy::DustThrottle(_) => "Dust Coverage Throttling",
            Policy::ScienceGrowth(_) => "Science Generation Growth",
            Policy::Maintenance(_) => "Fleet Maintenance",
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            Policy::DustThrottle(p) => p.enabled,
            Policy::ScienceGrowth(p) => p.enabled,
            Policy::Maintenance(p) => p.enabled,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        match self {
            Policy::DustThrottle(p) => p.enabled = enabled,
            Policy::ScienceGrowth(p) => p.enabled = enabled,
            Policy::Maintenance(p) => p.enabled = enabled,
        }
    }

    /// Capability probe: does this policy act on month boundaries?
    pub fn wants_growth_tick(&self) -> bool {
        matches!(self, Policy::ScienceGrowth(_))
    }

    /// Let the policy see this step's delivered events (pipeline-order
    /// bookkeeping). Called before `apply`.
    pub fn observe(&mut self, events: &[Event]) {
        if let Policy::ScienceGrowth(p) = self {
            p.observe(events);
        }
    }

    pub fn apply(
        &mut self,
        world: &mut WorldMutator,
        evaluation: &EvaluationResult,
    ) -> serde_json::Value {
        match self {
            Policy::DustThrottle(p) => p.apply(world, evaluation),
            Policy::ScienceGrowth(p) => p.apply(world, evaluation),
            Policy::Maintenance(p) => p.apply(world, evaluation),
        }
    }
}

/// Registry that applies enabled policies in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyEngine {
    pub policies: Vec<Policy>,
}

impl PolicyEngine {
    pub fn new(policies: Vec<Policy>) -> Self {
        Self { policies }
    }

    pub fn add_policy(&mut self, policy: Policy) {
        self.policies.push(policy);
    }

    pub fn remove_policy(&mut self, policy_id: &str) -> bool {
        let before = self.policies.len();
        self.policies.retain(|p| p.id() != policy_id);
        self.policies.len() < before
    }

    pub fn enable_policy(&mut self, policy_id: &str, enabled: bool) -> bool {
        for policy in &mut self.policies {
            if policy.id() == policy_id {
                policy.set_enabled(enabled);
                return true;
            }
        }
        false
    }

    pub fn observe_events(&mut self, events: &[Event]) {
        for policy in &mut self.policies {
            if policy.enabled() {
                policy.observe(events);
            }
        }
    }

    /// Apply all enabled policies; returns per-policy effects keyed by id.
    pub fn apply_policies(
        &mut self,
        world: &mut WorldMutator,
        evaluation: &EvaluationResult,
    ) -> BTreeMap<String, serde_json::Value> {
        let mut effects = BTreeMap::new();
        for policy in &mut self.policies {
            if !policy.enabled() {
                continue;
            }
            let effect = policy.apply(world, evaluation);
            effects.insert(policy.id().to_string(), effect);
        }
        effects
    }
}

/// Month index for a step under the experiment's step/month mapping.
pub fn month_of(t: Step, steps_per_month: u64) -> u64 {
    t / steps_per_month.max(1)
}

/// True on the first step of each month.
pub fn is_month_tick(t: Step, steps_per_month: u64) -> bool {
    t % steps_per_month.max(1) == 0
}
