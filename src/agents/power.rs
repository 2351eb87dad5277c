//! Power generation and storage components

use serde::{Deserialize, Serialize};

use crate::agents::lifecycle::Lifecycle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerGeneratorConfig {
    pub power_capacity_kwh: f64,
    pub efficiency: f64,
    /// Fraction of time the generator is usable (dust, night, maintenance).
    pub availability: f64,
}

impl Default for PowerGeneratorConfig {
    fn default() -> Self {
        Self {
            power_capacity_kwh: 10.0,
            efficiency: 1.0,
            availability: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerGenerator {
    pub lifecycle: Lifecycle,
    pub config: PowerGeneratorConfig,
    pub current_output_kwh: f64,
}

impl PowerGenerator {
    pub fn new(config: PowerGeneratorConfig) -> Self {
        Self {
            lifecycle: Lifecycle::new(None),
            config,
            current_output_kwh: 0.0,
        }
    }

    /// Generate up to capacity, bounded by what is actually useful.
    pub fn generate(&mut self, max_needed_kwh: f64) -> f64 {
        let max_output =
            self.config.power_capacity_kwh * self.config.efficiency * self.config.availability;
        self.current_output_kwh = max_output.min(max_needed_kwh).max(0.0);
        self.current_output_kwh
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerStorageConfig {
    pub max_operational_cap_kwh: f64,
    pub min_operational_cap_kwh: f64,
    pub initial_charge_kwh: f64,
    pub charge_efficiency: f64,
    pub discharge_efficiency: f64,
}

impl Default for PowerStorageConfig {
    fn default() -> Self {
        Self {
            max_operational_cap_kwh: 100.0,
            min_operational_cap_kwh: 0.0,
            initial_charge_kwh: 0.0,
            charge_efficiency: 0.95,
            discharge_efficiency: 0.98,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerStorage {
    pub lifecycle: Lifecycle,
    pub config: PowerStorageConfig,
    pub charge_level: f64,
}

impl PowerStorage {
    pub fn new(config: PowerStorageConfig) -> Self {
        let charge_level = config.initial_charge_kwh;
        Self {
            lifecycle: Lifecycle::new(None),
            config,
            charge_level,
        }
    }

    pub fn state_of_charge(&self) -> f64 {
        if self.config.max_operational_cap_kwh > 0.0 {
            self.charge_level / self.config.max_operational_cap_kwh
        } else {
            0.0
        }
    }

    pub fn available_capacity(&self) -> f64 {
        self.config.max_operational_cap_kwh - self.charge_level
    }

    pub fn available_discharge(&self) -> f64 {
        (self.charge_level - self.config.min_operational_cap_kwh).max(0.0)
    }

    /// Charge with losses; returns grid power actually consumed.
    pub fn charge(&mut self, power_kwh: f64) -> f64 {
        if power_kwh <= 0.0 {
            return 0.0;
        }
        let stored = (power_kwh * self.config.charge_efficiency).min(self.available_capacity());
        self.charge_level += stored;
        stored / self.config.charge_efficiency
    }

    /// Discharge with losses; returns power actually delivered.
    pub fn discharge(&mut self, power_kwh: f64) -> f64 {
        if power_kwh <= 0.0 {
            return 0.0;
        }
        let drawn =
            (power_kwh / self.config.discharge_efficiency).min(self.available_discharge());
        self.charge_level -= drawn;
        drawn * self.config.discharge_efficiency
    }
}
