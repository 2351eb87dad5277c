//! Science rover - battery-backed field science

use serde::{Deserialize, Serialize};

use crate::agents::lifecycle::Lifecycle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScienceRoverConfig {
    /// Battery drain per operating step, kWh.
    pub power_usage_kwh: f64,
    /// Science units produced per operating step.
    pub science_generation: f64,
    pub battery_capacity_kwh: f64,
    pub lifetime_steps: Option<u64>,
}

impl Default for ScienceRoverConfig {
    fn default() -> Self {
        Self {
            power_usage_kwh: 0.2,
            science_generation: 0.5,
            battery_capacity_kwh: 20.0,
            lifetime_steps: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoverStatus {
    Operational,
    Charging,
    LowBattery,
    WaitingForPower,
    Throttled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScienceRover {
    pub lifecycle: Lifecycle,
    pub config: ScienceRoverConfig,
    pub battery_kwh: f64,
    pub science_buffer: f64,
    pub status: RoverStatus,
}

impl ScienceRover {
    pub fn new(config: ScienceRoverConfig) -> Self {
        let lifetime = config.lifetime_steps;
        let battery = config.battery_capacity_kwh;
        Self {
            lifecycle: Lifecycle::new(lifetime),
            config,
            battery_kwh: battery,
            science_buffer: 0.0,
            status: RoverStatus::Charging,
        }
    }

    /// Battery below the per-step draw; the rover must charge before it can
    /// operate again.
    pub fn needs_charge(&self) -> bool {
        self.battery_kwh < self.config.power_usage_kwh
    }

    pub fn is_operational(&self) -> bool {
        self.status == RoverStatus::Operational
    }

    /// Grid power this rover would like to draw this step.
    pub fn power_demand(&self) -> f64 {
        if self.needs_charge() {
            self.config.battery_capacity_kwh - self.battery_kwh
        } else {
            0.0
        }
    }

    /// Operate or charge. Returns `(grid_power_drawn, science_generated)`.
    pub fn step(&mut self, available_power_kwh: f64) -> (f64, f64) {
        if self.needs_charge() {
            let charge_needed = self.config.battery_capacity_kwh - self.battery_kwh;
            let charge = charge_needed.min(available_power_kwh).max(0.0);
            self.battery_kwh = (self.battery_kwh + charge).min(self.config.battery_capacity_kwh);
            self.status = if charge > 0.0 {
                RoverStatus::Charging
            } else {
                RoverStatus::WaitingForPower
            };
            return (charge, 0.0);
        }

        self.battery_kwh -= self.config.power_usage_kwh;
        self.science_buffer += self.config.science_generation;
        self.status = RoverStatus::Operational;
        (0.0, self.config.science_generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operates_on_battery() {
        let mut rover = ScienceRover::new(ScienceRoverConfig::default());
        let (draw, science) = rover.step(100.0);
        assert_eq!(draw, 0.0);
        assert_eq!(science, 0.5);
        assert!(rover.is_operational());
        assert!((rover.battery_kwh - 19.8).abs() < 1e-9);
    }

    #[test]
    fn test_charges_when_depleted() {
        let mut rover = ScienceRover::new(ScienceRoverConfig::default());
        rover.battery_kwh = 0.1; // below the 0.2 kWh draw

        let (draw, science) = rover.step(5.0);
        assert_eq!(science, 0.0);
        assert!((draw - 5.0).abs() < 1e-9);
        assert_eq!(rover.status, RoverStatus::Charging);
        assert!((rover.battery_kwh - 5.1).abs() < 1e-9);
    }

    #[test]
    fn test_waiting_when_no_grid_power() {
        let mut rover = ScienceRover::new(ScienceRoverConfig::default());
        rover.battery_kwh = 0.0;
        let (draw, science) = rover.step(0.0);
        assert_eq!((draw, science), (0.0, 0.0));
        assert_eq!(rover.status, RoverStatus::WaitingForPower);
    }

    #[test]
    fn test_charge_clamped_to_capacity() {
        let mut rover = ScienceRover::new(ScienceRoverConfig::default());
        rover.battery_kwh = 0.1;
        rover.step(1000.0);
        assert_eq!(rover.battery_kwh, 20.0);
    }
}
