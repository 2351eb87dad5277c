//! Assembly robot - assembles modules from shells and equipment

use serde::{Deserialize, Serialize};

use crate::agents::lifecycle::{AgentState, Lifecycle};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyRobotConfig {
    pub max_power_usage_kwh: f64,
    pub efficiency: f64,
    pub assembly_time_steps: u64,
    pub lifetime_steps: Option<u64>,
}

impl Default for AssemblyRobotConfig {
    fn default() -> Self {
        Self {
            max_power_usage_kwh: 50.0,
            efficiency: 0.9,
            assembly_time_steps: 60,
            lifetime_steps: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyRobot {
    pub lifecycle: Lifecycle,
    pub config: AssemblyRobotConfig,
    pub steps_remaining: u64,
    pub current_module: Option<String>,
    pub modules_assembled: u64,
}

impl AssemblyRobot {
    pub fn new(config: AssemblyRobotConfig) -> Self {
        let lifetime = config.lifetime_steps;
        Self {
            lifecycle: Lifecycle::new(lifetime),
            config,
            steps_remaining: 0,
            current_module: None,
            modules_assembled: 0,
        }
    }

    /// Begin assembling `module_id` if idle. The sector has already reserved
    /// the shell and equipment inputs.
    pub fn start_assembly(&mut self, module_id: &str) -> bool {
        if !self.lifecycle.is_idle() {
            return false;
        }
        self.lifecycle.state = AgentState::Active;
        self.steps_remaining = self.config.assembly_time_steps;
        self.current_module = Some(module_id.to_string());
        true
    }

    pub fn is_assembling(&self) -> bool {
        self.lifecycle.state == AgentState::Active
    }

    pub fn power_demand(&self) -> f64 {
        if self.is_assembling() {
            self.config.max_power_usage_kwh
        } else {
            0.0
        }
    }

    /// Advance the assembly one step; returns the finished module id on
    /// completion.
    pub fn step(&mut self, power_ok: bool) -> Option<String> {
        if !self.is_assembling() || !power_ok {
            return None;
        }
        self.steps_remaining = self.steps_remaining.saturating_sub(1);
        if self.steps_remaining > 0 {
            return None;
        }
        self.modules_assembled += 1;
        self.lifecycle.state = AgentState::Idle;
        self.current_module.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembly_completes() {
        let config = AssemblyRobotConfig {
            assembly_time_steps: 2,
            ..AssemblyRobotConfig::default()
        };
        let mut robot = AssemblyRobot::new(config);
        assert!(robot.start_assembly("comp_science_rover"));
        assert!(robot.step(true).is_none());
        assert_eq!(robot.step(true).as_deref(), Some("comp_science_rover"));
        assert!(robot.lifecycle.is_idle());
        assert_eq!(robot.modules_assembled, 1);
    }

    #[test]
    fn test_busy_robot_rejects_new_task() {
        let mut robot = AssemblyRobot::new(AssemblyRobotConfig::default());
        assert!(robot.start_assembly("comp_isru_robot"));
        assert!(!robot.start_assembly("comp_rocket"));
        assert_eq!(robot.current_module.as_deref(), Some("comp_isru_robot"));
    }

    #[test]
    fn test_no_progress_without_power() {
        let config = AssemblyRobotConfig {
            assembly_time_steps: 1,
            ..AssemblyRobotConfig::default()
        };
        let mut robot = AssemblyRobot::new(config);
        robot.start_assembly("comp_rocket");
        assert!(robot.step(false).is_none());
        assert!(robot.is_assembling());
        assert_eq!(robot.step(true).as_deref(), Some("comp_rocket"));
    }
}
