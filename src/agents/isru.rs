//! ISRU agents - in-situ resource extraction and processing
//!
//! One ISRU agent runs one operational mode per task. Ice and regolith
//! extraction pull from the environment; electrolysis, metal refining, and
//! He-3 separation process stocks the sector already holds. He-3 yield is
//! stochastic: regolith concentration is drawn from a triangular
//! distribution over the environment's ppb bounds.

use serde::{Deserialize, Serialize};

use crate::agents::lifecycle::{AgentState, Lifecycle};
use crate::core::rng::StepRng;
use crate::core::types::{res, ResourceId};
use crate::ledger::Stocks;

/// Operational modes an ISRU agent can be tasked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsruMode {
    IceExtraction,
    RegolithExtraction,
    He3Extraction,
    Electrolysis,
    Metal,
}

impl IsruMode {
    pub const ALL: [IsruMode; 5] = [
        IsruMode::IceExtraction,
        IsruMode::RegolithExtraction,
        IsruMode::He3Extraction,
        IsruMode::Electrolysis,
        IsruMode::Metal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IsruMode::IceExtraction => "ice_extraction",
            IsruMode::RegolithExtraction => "regolith_extraction",
            IsruMode::He3Extraction => "he3_extraction",
            IsruMode::Electrolysis => "electrolysis",
            IsruMode::Metal => "metal",
        }
    }

    /// Primary output resource the mode replenishes.
    pub fn output_resource(&self) -> &'static str {
        match self {
            IsruMode::IceExtraction => res::H2O,
            IsruMode::RegolithExtraction => res::REGOLITH,
            IsruMode::He3Extraction => res::HE3,
            IsruMode::Electrolysis => res::H2,
            IsruMode::Metal => res::METAL,
        }
    }
}

/// He-3 concentration bounds in regolith, ppb.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct He3Concentration {
    pub min_ppb: f64,
    pub max_ppb: f64,
}

impl He3Concentration {
    pub fn mode_ppb(&self) -> f64 {
        (self.min_ppb + self.max_ppb) / 2.0
    }
}

impl Default for He3Concentration {
    fn default() -> Self {
        Self {
            min_ppb: 2.0,
            max_ppb: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsruConfig {
    pub ice_extraction_power_kwh: f64,
    pub ice_extraction_output_kg: f64,
    pub regolith_extraction_power_kwh: f64,
    pub regolith_extraction_output_kg: f64,
    pub he3_extraction_power_kwh: f64,
    /// Regolith mass processed per step when separating He-3, in tons.
    pub he3_throughput_tons_per_step: f64,
    pub electrolysis_power_kwh: f64,
    pub electrolysis_water_usage_kg: f64,
    pub metal_power_kwh: f64,
    pub metal_regolith_usage_kg: f64,
    pub metal_output_kg: f64,
    pub efficiency: f64,
    pub lifetime_steps: Option<u64>,
    pub modes: Vec<IsruMode>,
}

impl Default for IsruConfig {
    fn default() -> Self {
        Self {
            ice_extraction_power_kwh: 5.0,
            ice_extraction_output_kg: 20.0,
            regolith_extraction_power_kwh: 10.0,
            regolith_extraction_output_kg: 100.0,
            he3_extraction_power_kwh: 50.0,
            he3_throughput_tons_per_step: 100.0,
            electrolysis_power_kwh: 30.0,
            electrolysis_water_usage_kg: 10.0,
            metal_power_kwh: 20.0,
            metal_regolith_usage_kg: 50.0,
            metal_output_kg: 10.0,
            efficiency: 0.9,
            lifetime_steps: None,
            modes: IsruMode::ALL.to_vec(),
        }
    }
}

/// What one agent produced and consumed in a step. The sector turns this
/// into a single ledger transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Production {
    pub outputs: Vec<(ResourceId, f64)>,
    pub inputs: Vec<(ResourceId, f64)>,
    pub power_used: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsruAgent {
    pub lifecycle: Lifecycle,
    pub config: IsruConfig,
    /// Mode assigned by the sector scheduler for the current task.
    pub mode: Option<IsruMode>,
}

impl IsruAgent {
    pub fn new(config: IsruConfig) -> Self {
        let lifetime = config.lifetime_steps;
        Self {
            lifecycle: Lifecycle::new(lifetime),
            config,
            mode: None,
        }
    }

    pub fn supports(&self, mode: IsruMode) -> bool {
        self.config.modes.contains(&mode)
    }

    pub fn power_for(&self, mode: IsruMode) -> f64 {
        match mode {
            IsruMode::IceExtraction => self.config.ice_extraction_power_kwh,
            IsruMode::RegolithExtraction => self.config.regolith_extraction_power_kwh,
            IsruMode::He3Extraction => self.config.he3_extraction_power_kwh,
            IsruMode::Electrolysis => self.config.electrolysis_power_kwh,
            IsruMode::Metal => self.config.metal_power_kwh,
        }
    }

    /// Stock the assigned mode consumes, if any.
    pub fn input_for(&self, mode: IsruMode) -> Option<(&'static str, f64)> {
        match mode {
            IsruMode::Electrolysis => Some((res::H2O, self.config.electrolysis_water_usage_kg)),
            IsruMode::Metal => Some((res::REGOLITH, self.config.metal_regolith_usage_kg)),
            _ => None,
        }
    }

    /// Run the assigned mode for one step.
    ///
    /// The scheduler has already verified stock availability; this checks
    /// power, consumes inputs, and reports outputs. Returns `None` when the
    /// agent had no assignment or too little power.
    pub fn run(
        &mut self,
        power_allocated: f64,
        stocks: &Stocks,
        he3: He3Concentration,
        rng: &mut StepRng,
    ) -> Option<Production> {
        let mode = self.mode?;
        let power_needed = self.power_for(mode);
        if power_allocated < power_needed {
            self.lifecycle.state = AgentState::Idle;
            self.mode = None;
            return None;
        }
        if let Some((resource, amount)) = self.input_for(mode) {
            if !stocks.has_at_least(resource, amount) {
                self.lifecycle.state = AgentState::Idle;
                self.mode = None;
                return None;
            }
        }

        let eff = self.config.efficiency;
        let mut production = Production {
            power_used: power_needed,
            ..Production::default()
        };

        match mode {
            IsruMode::IceExtraction => {
                production
                    .outputs
                    .push((res::H2O.into(), self.config.ice_extraction_output_kg * eff));
            }
            IsruMode::RegolithExtraction => {
                production.outputs.push((
                    res::REGOLITH.into(),
                    self.config.regolith_extraction_output_kg * eff,
                ));
            }
            IsruMode::He3Extraction => {
                let ppb = rng.triangular(he3.min_ppb, he3.mode_ppb(), he3.max_ppb);
                let output =
                    self.config.he3_throughput_tons_per_step * 1000.0 * ppb * 1e-9 * eff;
                production.outputs.push((res::HE3.into(), output));
            }
            IsruMode::Electrolysis => {
                let water = self.config.electrolysis_water_usage_kg;
                production.inputs.push((res::H2O.into(), water));
                // Water splits 1:8 hydrogen to oxygen by mass.
                production.outputs.push((res::H2.into(), water * eff / 9.0));
                production
                    .outputs
                    .push((res::O2.into(), water * eff * 8.0 / 9.0));
            }
            IsruMode::Metal => {
                production
                    .inputs
                    .push((res::REGOLITH.into(), self.config.metal_regolith_usage_kg));
                production
                    .outputs
                    .push((res::METAL.into(), self.config.metal_output_kg * eff));
            }
        }

        // Mode assignments are per-task; the scheduler re-assigns next step.
        self.lifecycle.state = AgentState::Idle;
        self.mode = None;
        Some(production)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> IsruAgent {
        IsruAgent::new(IsruConfig::default())
    }

    #[test]
    fn test_ice_extraction_output() {
        let mut agent = agent();
        agent.mode = Some(IsruMode::IceExtraction);
        let mut rng = StepRng::new(42, 0);
        let production = agent
            .run(10.0, &Stocks::new(), He3Concentration::default(), &mut rng)
            .unwrap();

        assert_eq!(production.outputs, vec![(res::H2O.to_string(), 18.0)]);
        assert_eq!(production.power_used, 5.0);
        assert!(agent.lifecycle.is_idle());
    }

    #[test]
    fn test_insufficient_power_skips() {
        let mut agent = agent();
        agent.mode = Some(IsruMode::He3Extraction);
        let mut rng = StepRng::new(42, 0);
        let production = agent.run(10.0, &Stocks::new(), He3Concentration::default(), &mut rng);
        assert!(production.is_none());
        assert!(agent.mode.is_none());
    }

    #[test]
    fn test_he3_output_within_concentration_bounds() {
        let he3 = He3Concentration {
            min_ppb: 2.0,
            max_ppb: 20.0,
        };
        let mut rng = StepRng::new(7, 3);
        for _ in 0..100 {
            let mut agent = agent();
            agent.mode = Some(IsruMode::He3Extraction);
            let production = agent.run(100.0, &Stocks::new(), he3, &mut rng).unwrap();
            let (_, output) = &production.outputs[0];
            // throughput 100 t * 1000 kg/t * ppb * 1e-9 * 0.9
            let lo = 100.0 * 1000.0 * 2.0 * 1e-9 * 0.9;
            let hi = 100.0 * 1000.0 * 20.0 * 1e-9 * 0.9;
            assert!(*output >= lo && *output <= hi, "output {output} outside bounds");
        }
    }

    #[test]
    fn test_electrolysis_consumes_water() {
        let mut agent = agent();
        agent.mode = Some(IsruMode::Electrolysis);
        let stocks = Stocks::with_initial([(res::H2O.to_string(), 50.0)]);
        let mut rng = StepRng::new(42, 0);
        let production = agent
            .run(100.0, &stocks, He3Concentration::default(), &mut rng)
            .unwrap();

        assert_eq!(production.inputs, vec![(res::H2O.to_string(), 10.0)]);
        let total_out: f64 = production.outputs.iter().map(|(_, v)| v).sum();
        assert!((total_out - 9.0).abs() < 1e-9); // 10 kg * 0.9 efficiency
    }

    #[test]
    fn test_electrolysis_without_water_skips() {
        let mut agent = agent();
        agent.mode = Some(IsruMode::Electrolysis);
        let mut rng = StepRng::new(42, 0);
        let production = agent.run(100.0, &Stocks::new(), He3Concentration::default(), &mut rng);
        assert!(production.is_none());
    }
}
