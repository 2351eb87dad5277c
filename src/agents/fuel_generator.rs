//! Fuel generator - converts He-3 into rocket propellant
//!
//! `kWh_avail = He3_processed * GWh_thermal * 1e6 * efficiency`
//! `prop_out  = kWh_avail / kWh_per_kg_prop`

use serde::{Deserialize, Serialize};

use crate::agents::lifecycle::Lifecycle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuelGeneratorConfig {
    pub efficiency: f64,
    pub thermal_gwh_per_kg: f64,
    pub kwh_per_kg_prop: f64,
    /// He-3 processing cap per step, kg.
    pub he3_kg_per_step: f64,
    pub lifetime_steps: Option<u64>,
}

impl Default for FuelGeneratorConfig {
    fn default() -> Self {
        Self {
            efficiency: 0.025,
            thermal_gwh_per_kg: 163.489,
            kwh_per_kg_prop: 50.0,
            he3_kg_per_step: 5.0,
            lifetime_steps: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelGenerator {
    pub lifecycle: Lifecycle,
    pub config: FuelGeneratorConfig,
    pub prop_generated_total: f64,
}

impl FuelGenerator {
    pub fn new(config: FuelGeneratorConfig) -> Self {
        let lifetime = config.lifetime_steps;
        Self {
            lifecycle: Lifecycle::new(lifetime),
            config,
            prop_generated_total: 0.0,
        }
    }

    /// Process up to the per-step He-3 cap and produce propellant.
    ///
    /// Returns `(he3_consumed_kg, prop_generated_kg)`.
    pub fn step(&mut self, available_he3_kg: f64) -> (f64, f64) {
        if available_he3_kg <= 0.0 || self.config.kwh_per_kg_prop <= 0.0 {
            return (0.0, 0.0);
        }
        let he3_to_process = self.config.he3_kg_per_step.min(available_he3_kg);
        let kwh_available =
            self.config.thermal_gwh_per_kg * 1e6 * he3_to_process * self.config.efficiency;
        let prop_generated = kwh_available / self.config.kwh_per_kg_prop;
        self.prop_generated_total += prop_generated;
        (he3_to_process, prop_generated)
    }
}
