//! Science sector - rover fleet and research output
//!
//! Rovers either run field science off their batteries or charge from the
//! grid. The sector throttle is a per-rover Bernoulli skip, so a throttle of
//! 0.4 removes roughly 40% of rover activations per step. The fleet grows
//! when construction announces a finished science rover module.

use serde::{Deserialize, Serialize};

use crate::agents::lifecycle::AgentState;
use crate::agents::science_rover::{RoverStatus, ScienceRover, ScienceRoverConfig};
use crate::core::constants::{METRIC_ROVER_COUNT, METRIC_SCIENCE_RATE};
use crate::core::error::Result;
use crate::core::types::SectorId;
use crate::events::{Event, EventPayload};
use crate::sectors::{SectorMetrics, StepContext};

pub const SCIENCE_ROVER_MODULE: &str = "comp_science_rover";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScienceConfig {
    /// Base draw for lab operations, before any rover charging.
    pub baseline_power_kwh: f64,
    /// Template applied to rovers delivered by construction.
    pub rover_template: ScienceRoverConfig,
    /// Per-agent chance of a hardware fault per step.
    pub fault_chance: f64,
}

impl Default for ScienceConfig {
    fn default() -> Self {
        Self {
            baseline_power_kwh: 2.0,
            rover_template: ScienceRoverConfig::default(),
            fault_chance: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScienceSector {
    pub config: ScienceConfig,
    pub rovers: Vec<ScienceRover>,
    pub throttle_factor: f64,
    /// Science output cap per step set by policy; zero means uncapped.
    pub target_rate: f64,
    pub step_science_generated: f64,
    pub total_science_cumulative: f64,
    pub step_power_used: f64,
    pub rovers_added_total: u64,
}

impl ScienceSector {
    pub fn new(config: ScienceConfig, rovers: Vec<ScienceRover>) -> Self {
        Self {
            config,
            rovers,
            throttle_factor: 0.0,
            target_rate: 0.0,
            step_science_generated: 0.0,
            total_science_cumulative: 0.0,
            step_power_used: 0.0,
            rovers_added_total: 0,
        }
    }

    pub fn set_throttle_factor(&mut self, factor: f64) {
        self.throttle_factor = factor.clamp(0.0, 1.0);
    }

    pub fn set_target_rate(&mut self, rate: f64) {
        self.target_rate = rate.max(0.0);
    }

    pub fn operational_rovers(&self) -> usize {
        self.rovers.iter().filter(|r| r.is_operational()).count()
    }

    /// Rovers that could work this step (not retired, not faulted).
    pub fn active_fleet(&self) -> usize {
        self.rovers
            .iter()
            .filter(|r| !r.lifecycle.is_retired() && r.lifecycle.state != AgentState::Fault)
            .count()
    }

    pub fn power_demand(&self) -> f64 {
        let charging: f64 = self
            .rovers
            .iter()
            .filter(|r| !r.lifecycle.is_retired())
            .map(|r| r.power_demand())
            .sum();
        self.config.baseline_power_kwh + charging
    }

    pub fn handle_event(&mut self, event: &Event, _ctx: &mut StepContext) -> Result<()> {
        if let EventPayload::ModuleCompleted {
            recipient,
            module_id,
            quantity,
        } = &event.payload
        {
            if *recipient == SectorId::Science && module_id == SCIENCE_ROVER_MODULE {
                for _ in 0..*quantity {
                    self.rovers
                        .push(ScienceRover::new(self.config.rover_template.clone()));
                    self.rovers_added_total += 1;
                }
            }
        }
        Ok(())
    }

    pub fn step(&mut self, power: f64, ctx: &mut StepContext) {
        self.step_science_generated = 0.0;
        self.step_power_used = 0.0;
        let mut remaining_power = (power - self.config.baseline_power_kwh).max(0.0);

        for rover in &mut self.rovers {
            if !rover.lifecycle.begin_step() {
                continue;
            }
            if self.config.fault_chance > 0.0 && ctx.rng.chance(self.config.fault_chance) {
                rover.lifecycle.fault();
                continue;
            }
            if ctx.rng.chance(self.throttle_factor) {
                rover.lifecycle.state = AgentState::Throttled;
                rover.status = RoverStatus::Throttled;
                continue;
            }
            if self.target_rate > 0.0 && self.step_science_generated >= self.target_rate {
                // Target met; idle the rest of the fleet this step.
                continue;
            }
            let (power_used, science) = rover.step(remaining_power);
            remaining_power = (remaining_power - power_used).max(0.0);
            self.step_power_used += power_used;
            self.step_science_generated += science;
        }

        self.total_science_cumulative += self.step_science_generated;
    }

    pub fn metrics(&self) -> SectorMetrics {
        let mut metrics = SectorMetrics::default();
        metrics.gauge("science_generated", self.step_science_generated);
        metrics.gauge("total_science_cumulative", self.total_science_cumulative);
        metrics.gauge("operational_rovers", self.operational_rovers() as f64);
        metrics.gauge("fleet_size", self.rovers.len() as f64);
        metrics.gauge("power_used", self.step_power_used);
        metrics.contribute(METRIC_SCIENCE_RATE, self.step_science_generated);
        metrics.contribute(METRIC_ROVER_COUNT, self.active_fleet() as f64);
        metrics
    }
}
