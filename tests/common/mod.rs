//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::collections::BTreeMap;

use proxima::agents::isru::{IsruAgent, IsruConfig};
use proxima::agents::power::{PowerGenerator, PowerGeneratorConfig};
use proxima::agents::printing_robot::{PrintingRobot, PrintingRobotConfig};
use proxima::agents::rocket::{Rocket, RocketConfig};
use proxima::agents::science_rover::{ScienceRover, ScienceRoverConfig};
use proxima::core::constants::{METRIC_DUST_COVERAGE, METRIC_SCIENCE_RATE};
use proxima::core::types::{res, BufferTarget, Location};
use proxima::evaluation::{EvaluationEngine, Goal, GoalDirection, GoalKind, MetricDefinition};
use proxima::ledger::CommitMode;
use proxima::policy::PolicyEngine;
use proxima::sectors::construction::ConstructionConfig;
use proxima::sectors::manufacturing::ManufacturingConfig;
use proxima::sectors::science::ScienceConfig;
use proxima::sectors::transportation::TransportationConfig;
use proxima::sectors::{
    ConstructionSector, EnergySector, EquipmentSector, ManufacturingSector, ScienceSector,
    TransportationSector,
};
use proxima::world::{World, WorldConfig};

pub fn dust_goal(target: f64) -> Goal {
    Goal {
        id: "WS-PG-004".to_string(),
        name: "Dust coverage cap".to_string(),
        metric_id: METRIC_DUST_COVERAGE.to_string(),
        direction: GoalDirection::Minimize,
        kind: GoalKind::Target { target },
        weight: 1.0,
        horizon_steps: None,
    }
}

pub fn standard_metrics() -> Vec<MetricDefinition> {
    vec![
        MetricDefinition::new(METRIC_DUST_COVERAGE, "Dust coverage")
            .negative()
            .cumulative(),
        MetricDefinition::new(METRIC_SCIENCE_RATE, "Science production rate"),
        MetricDefinition::new("SCI-ROVER-COUNT", "Active science rovers"),
    ]
}

pub struct WorldSpec {
    pub rover_count: usize,
    pub isru_count: usize,
    pub rocket_count: usize,
    pub generator_capacity_kwh: f64,
    pub rocket_fuel_kg: f64,
    pub goals: Vec<Goal>,
    pub policies: PolicyEngine,
    pub commit_mode: CommitMode,
    pub steps_per_month: u64,
    pub transportation: TransportationConfig,
    pub rocket_location: Location,
}

impl Default for WorldSpec {
    fn default() -> Self {
        Self {
            rover_count: 4,
            isru_count: 2,
            rocket_count: 1,
            generator_capacity_kwh: 500.0,
            rocket_fuel_kg: 10_000.0,
            goals: Vec::new(),
            policies: PolicyEngine::default(),
            commit_mode: CommitMode::Strict,
            steps_per_month: 720,
            transportation: TransportationConfig::default(),
            rocket_location: Location::Moon,
        }
    }
}

/// Assemble a small but fully-wired world without going through the store.
pub fn build_world(spec: WorldSpec, seed: u64) -> World {
    let rovers = (0..spec.rover_count)
        .map(|_| ScienceRover::new(ScienceRoverConfig::default()))
        .collect();

    let mut buffer_targets = BTreeMap::new();
    buffer_targets.insert(
        res::H2O.to_string(),
        BufferTarget {
            min: 1_000.0,
            max: 5_000.0,
        },
    );
    buffer_targets.insert(
        res::HE3.to_string(),
        BufferTarget { min: 5.0, max: 50.0 },
    );
    let isru_agents = (0..spec.isru_count)
        .map(|_| IsruAgent::new(IsruConfig::default()))
        .collect();
    let manufacturing = ManufacturingSector::new(
        ManufacturingConfig {
            buffer_targets,
            // He-3 starts below its buffer floor so the stochastic
            // extraction mode runs from the first steps.
            initial_stocks: [
                (res::REGOLITH.to_string(), 11_000.0),
                (res::H2O.to_string(), 600.0),
                (res::HE3.to_string(), 2.0),
            ]
            .into_iter()
            .collect(),
            ..ManufacturingConfig::default()
        },
        isru_agents,
    );

    let mut transportation_config = spec.transportation;
    transportation_config
        .initial_stocks
        .insert(res::ROCKET_FUEL.to_string(), spec.rocket_fuel_kg);
    let rockets = (0..spec.rocket_count)
        .map(|_| {
            Rocket::new(RocketConfig {
                initial_location: spec.rocket_location,
                cruise_speed_km_per_step: 38_440.0,
                ..RocketConfig::default()
            })
        })
        .collect();
    let transportation = TransportationSector::new(transportation_config, rockets, Vec::new());

    let construction = ConstructionSector::new(
        ConstructionConfig {
            initial_stocks: [
                (res::REGOLITH.to_string(), 10_000.0),
                (res::SHELLS.to_string(), 5.0),
            ]
            .into_iter()
            .collect(),
            ..ConstructionConfig::default()
        },
        vec![PrintingRobot::new(PrintingRobotConfig {
            processing_time_steps: 8,
            ..PrintingRobotConfig::default()
        })],
        Vec::new(),
    );

    let config = WorldConfig {
        experiment_id: "exp_test".to_string(),
        steps_per_month: spec.steps_per_month,
        commit_mode: spec.commit_mode,
        scheduled_events: Vec::new(),
        energy: EnergySector::new(
            Default::default(),
            vec![PowerGenerator::new(PowerGeneratorConfig {
                power_capacity_kwh: spec.generator_capacity_kwh,
                ..PowerGeneratorConfig::default()
            })],
            Vec::new(),
        ),
        science: ScienceSector::new(ScienceConfig::default(), rovers),
        manufacturing,
        equipment: EquipmentSector::new(Default::default()),
        transportation,
        construction,
        evaluation: EvaluationEngine::new(
            standard_metrics(),
            spec.goals,
            0.0,
            spec.steps_per_month,
        ),
        policy: spec.policies,
    };
    World::new(config, seed)
}
