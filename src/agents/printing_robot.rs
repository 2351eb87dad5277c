//! Printing robot - 3D prints structural shells from regolith

use serde::{Deserialize, Serialize};

use crate::agents::lifecycle::{AgentState, Lifecycle};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintingRobotConfig {
    pub max_power_usage_kwh: f64,
    pub efficiency: f64,
    pub processing_time_steps: u64,
    pub regolith_usage_kg: f64,
    pub lifetime_steps: Option<u64>,
}

impl Default for PrintingRobotConfig {
    fn default() -> Self {
        Self {
            max_power_usage_kwh: 65.0,
            efficiency: 0.9,
            processing_time_steps: 80,
            regolith_usage_kg: 200.0,
            lifetime_steps: None,
        }
    }
}

/// Outcome of one printing step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PrintResult {
    pub shell_produced: bool,
    pub regolith_consumed: f64,
    pub power_used: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintingRobot {
    pub lifecycle: Lifecycle,
    pub config: PrintingRobotConfig,
    pub steps_remaining: u64,
    pub shells_produced: u64,
}

impl PrintingRobot {
    pub fn new(config: PrintingRobotConfig) -> Self {
        let lifetime = config.lifetime_steps;
        Self {
            lifecycle: Lifecycle::new(lifetime),
            config,
            steps_remaining: 0,
            shells_produced: 0,
        }
    }

    /// Begin a print task if idle. Returns false when busy.
    pub fn start_printing(&mut self) -> bool {
        if !self.lifecycle.is_idle() {
            return false;
        }
        self.lifecycle.state = AgentState::Active;
        self.steps_remaining = self.config.processing_time_steps;
        true
    }

    pub fn is_printing(&self) -> bool {
        self.lifecycle.state == AgentState::Active
    }

    pub fn power_demand(&self) -> f64 {
        if self.is_printing() {
            self.config.max_power_usage_kwh
        } else {
            0.0
        }
    }

    /// Advance the print task one step.
    ///
    /// The task needs power and regolith on hand every step; lacking either
    /// stalls the task without losing progress. Regolith is consumed in one
    /// transaction at completion, together with the shell credit.
    pub fn step(&mut self, power_ok: bool, regolith_available: bool) -> PrintResult {
        let mut result = PrintResult::default();
        if !self.is_printing() {
            return result;
        }
        if !power_ok || !regolith_available {
            return result;
        }

        result.power_used = self.config.max_power_usage_kwh;
        self.steps_remaining = self.steps_remaining.saturating_sub(1);

        if self.steps_remaining == 0 {
            result.shell_produced = true;
            result.regolith_consumed = self.config.regolith_usage_kg;
            self.shells_produced += 1;
            self.lifecycle.state = AgentState::Idle;
        }
        result
    }
}
