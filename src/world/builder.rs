//! World builder - resolves store documents into a runnable world
//!
//! Configuration lives in the document store: an experiment points at a
//! world system, which composes component templates per sector and
//! activates goal and policy sets against an environment. Component
//! resolution is overlay-based: the sector's component config overrides the
//! template defaults, key by key. Any missing or malformed document is a
//! `ConfigError` before the simulation starts.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::agents::assembly_robot::{AssemblyRobot, AssemblyRobotConfig};
use crate::agents::fuel_generator::{FuelGenerator, FuelGeneratorConfig};
use crate::agents::isru::{He3Concentration, IsruAgent, IsruConfig};
use crate::agents::power::{
    PowerGenerator, PowerGeneratorConfig, PowerStorage, PowerStorageConfig,
};
use crate::agents::printing_robot::{PrintingRobot, PrintingRobotConfig};
use crate::agents::rocket::{Rocket, RocketConfig};
use crate::agents::science_rover::{ScienceRover, ScienceRoverConfig};
use crate::core::constants::{DEFAULT_LOG_SKIP_STEPS, DEFAULT_STEPS_PER_MONTH};
use crate::core::error::{ProximaError, Result};
use crate::evaluation::{EvaluationEngine, Goal, MetricDefinition};
use crate::ledger::CommitMode;
use crate::policy::{Policy, PolicyEngine};
use crate::sectors::energy::EnergyConfig;
use crate::sectors::{
    ConstructionSector, EnergySector, EquipmentSector, ManufacturingSector, ScienceSector,
    TransportationSector,
};
use crate::sectors::construction::ConstructionConfig;
use crate::sectors::equipment::EquipmentConfig;
use crate::sectors::manufacturing::ManufacturingConfig;
use crate::sectors::science::ScienceConfig;
use crate::sectors::transportation::TransportationConfig;
use crate::store::DocumentStore;
use crate::world::{ScheduledEvent, World, WorldConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentDoc {
    #[serde(alias = "_id")]
    pub id: String,
    pub world_system_id: String,
    #[serde(default)]
    pub simulation_time_steps: Option<u64>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub steps_per_month: Option<u64>,
    #[serde(default)]
    pub log_skip_steps: Option<u64>,
    #[serde(default)]
    pub commit_mode: Option<CommitMode>,
}

#[derive(Debug, Clone, Deserialize)]
struct EnvironmentDoc {
    #[serde(alias = "_id")]
    #[allow(dead_code)]
    id: String,
    #[serde(default)]
    metrics: Vec<MetricDefinition>,
    #[serde(default)]
    resources: Vec<ResourceSpec>,
    #[serde(default)]
    dust_decay_per_step: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct ResourceSpec {
    resource: String,
    #[serde(default)]
    density_ppb: Option<[f64; 2]>,
}

#[derive(Debug, Clone, Deserialize)]
struct ComponentTemplateDoc {
    #[serde(alias = "_id")]
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    config: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
struct ComponentRef {
    template_id: String,
    #[serde(default = "default_quantity")]
    quantity: u32,
    #[serde(default)]
    config: serde_json::Value,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
struct WorldSystemDoc {
    #[serde(alias = "_id")]
    #[allow(dead_code)]
    id: String,
    environment_id: String,
    #[serde(default)]
    active_components: BTreeMap<String, Vec<ComponentRef>>,
    #[serde(default)]
    sector_configs: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    active_goal_ids: Vec<String>,
    #[serde(default)]
    active_policy_ids: Vec<String>,
    #[serde(default)]
    active_event_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct EventDoc {
    #[serde(alias = "_id")]
    #[allow(dead_code)]
    id: String,
    t: u64,
    event: serde_json::Value,
}

/// Everything the runner needs to know that is not world state.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub world: World,
    pub world_system_id: String,
    pub simulation_time_steps: Option<u64>,
    pub log_skip_steps: u64,
}

fn config_error<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> ProximaError + '_ {
    move |e| ProximaError::Config(format!("{context}: {e}"))
}

/// Sector config over template defaults, key by key.
fn overlay(template: &serde_json::Value, component: &serde_json::Value) -> serde_json::Value {
    let mut merged = match template {
        serde_json::Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    if let serde_json::Value::Object(overrides) = component {
        for (key, value) in overrides {
            merged.insert(key.clone(), value.clone());
        }
    }
    serde_json::Value::Object(merged)
}

fn parse_config<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
    context: &str,
) -> Result<T> {
    serde_json::from_value(value).map_err(config_error(context))
}

struct ComponentSet {
    generators: Vec<PowerGenerator>,
    storages: Vec<PowerStorage>,
    rovers: Vec<ScienceRover>,
    rover_template: Option<ScienceRoverConfig>,
    isru_agents: Vec<IsruAgent>,
    printing_robots: Vec<PrintingRobot>,
    assembly_robots: Vec<AssemblyRobot>,
    rockets: Vec<Rocket>,
    fuel_generators: Vec<FuelGenerator>,
}

fn resolve_components(
    world_system: &WorldSystemDoc,
    templates: &BTreeMap<String, ComponentTemplateDoc>,
) -> Result<ComponentSet> {
    let mut set = ComponentSet {
        generators: Vec::new(),
        storages: Vec::new(),
        rovers: Vec::new(),
        rover_template: None,
        isru_agents: Vec::new(),
        printing_robots: Vec::new(),
        assembly_robots: Vec::new(),
        rockets: Vec::new(),
        fuel_generators: Vec::new(),
    };

    for (sector, components) in &world_system.active_components {
        for component in components {
            let template = templates.get(&component.template_id).ok_or_else(|| {
                ProximaError::Config(format!(
                    "unknown component template {} in sector {sector}",
                    component.template_id
                ))
            })?;
            let merged = overlay(&template.config, &component.config);
            let context = template.id.as_str();

            match template.kind.as_str() {
                "power_generator" => {
                    let config: PowerGeneratorConfig = parse_config(merged, context)?;
                    for _ in 0..component.quantity {
                        set.generators.push(PowerGenerator::new(config.clone()));
                    }
                }
                "power_storage" => {
                    let config: PowerStorageConfig = parse_config(merged, context)?;
                    for _ in 0..component.quantity {
                        set.storages.push(PowerStorage::new(config.clone()));
                    }
                }
                "science_rover" => {
                    let config: ScienceRoverConfig = parse_config(merged, context)?;
                    if set.rover_template.is_none() {
                        set.rover_template = Some(config.clone());
                    }
                    for _ in 0..component.quantity {
                        set.rovers.push(ScienceRover::new(config.clone()));
                    }
                }
                "isru" => {
                    let config: IsruConfig = parse_config(merged, context)?;
                    for _ in 0..component.quantity {
                        set.isru_agents.push(IsruAgent::new(config.clone()));
                    }
                }
                "printing_robot" => {
                    let config: PrintingRobotConfig = parse_config(merged, context)?;
                    for _ in 0..component.quantity {
                        set.printing_robots.push(PrintingRobot::new(config.clone()));
                    }
                }
                "assembly_robot" => {
                    let config: AssemblyRobotConfig = parse_config(merged, context)?;
                    for _ in 0..component.quantity {
                        set.assembly_robots.push(AssemblyRobot::new(config.clone()));
                    }
                }
                "rocket" => {
                    let config: RocketConfig = parse_config(merged, context)?;
                    for _ in 0..component.quantity {
                        set.rockets.push(Rocket::new(config.clone()));
                    }
                }
                "fuel_generator" => {
                    let config: FuelGeneratorConfig = parse_config(merged, context)?;
                    for _ in 0..component.quantity {
                        set.fuel_generators.push(FuelGenerator::new(config.clone()));
                    }
                }
                other => {
                    return Err(ProximaError::Config(format!(
                        "template {} has unknown type {other}",
                        template.id
                    )));
                }
            }
        }
    }
    Ok(set)
}

/// Build a world for `experiment_id` from the store's documents.
pub fn build_world(store: &dyn DocumentStore, experiment_id: &str) -> Result<BuildOutput> {
    let experiment: ExperimentDoc = store
        .get("experiments", experiment_id)?
        .map(|doc| parse_config(doc, "experiment"))
        .transpose()?
        .ok_or_else(|| ProximaError::Config(format!("experiment {experiment_id} not found")))?;

    let world_system: WorldSystemDoc = store
        .get("world_systems", &experiment.world_system_id)?
        .map(|doc| parse_config(doc, "world_system"))
        .transpose()?
        .ok_or_else(|| {
            ProximaError::Config(format!(
                "world system {} not found",
                experiment.world_system_id
            ))
        })?;

    let environment: EnvironmentDoc = store
        .get("environments", &world_system.environment_id)?
        .map(|doc| parse_config(doc, "environment"))
        .transpose()?
        .ok_or_else(|| {
            ProximaError::Config(format!(
                "environment {} not found",
                world_system.environment_id
            ))
        })?;

    let templates: BTreeMap<String, ComponentTemplateDoc> = store
        .list("component_templates")?
        .into_iter()
        .map(|doc| parse_config::<ComponentTemplateDoc>(doc, "component_template"))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .map(|t| (t.id.clone(), t))
        .collect();

    let components = resolve_components(&world_system, &templates)?;

    let sector_config = |name: &str| -> serde_json::Value {
        world_system
            .sector_configs
            .get(name)
            .cloned()
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()))
    };

    let steps_per_month = experiment.steps_per_month.unwrap_or(DEFAULT_STEPS_PER_MONTH);

    // He-3 concentration bounds come from the environment's resource table.
    let he3 = environment
        .resources
        .iter()
        .find(|r| r.resource == "helium3")
        .and_then(|r| r.density_ppb)
        .map(|[min_ppb, max_ppb]| He3Concentration { min_ppb, max_ppb })
        .unwrap_or_default();

    let energy_config: EnergyConfig = parse_config(sector_config("energy"), "energy config")?;
    let mut science_config: ScienceConfig =
        parse_config(sector_config("science"), "science config")?;
    if let Some(template) = &components.rover_template {
        science_config.rover_template = template.clone();
    }
    let mut manufacturing_config: ManufacturingConfig =
        parse_config(sector_config("manufacturing"), "manufacturing config")?;
    manufacturing_config.he3_concentration = he3;
    let equipment_config: EquipmentConfig = parse_config(
        sector_config("equipment_manufacturing"),
        "equipment config",
    )?;
    let transportation_config: TransportationConfig =
        parse_config(sector_config("transportation"), "transportation config")?;
    let construction_config: ConstructionConfig =
        parse_config(sector_config("construction"), "construction config")?;

    let mut goals = Vec::new();
    for goal_id in &world_system.active_goal_ids {
        let doc = store
            .get("goals", goal_id)?
            .ok_or_else(|| ProximaError::Config(format!("goal {goal_id} not found")))?;
        let goal: Goal = parse_config(doc, "goal")?;
        goals.push(goal);
    }

    let mut policies = Vec::new();
    for policy_id in &world_system.active_policy_ids {
        let doc = store
            .get("policies", policy_id)?
            .ok_or_else(|| ProximaError::Config(format!("policy {policy_id} not found")))?;
        let mut policy: Policy = parse_config(doc, "policy")?;
        // The month mapping is an experiment property, not a policy one.
        if let Policy::ScienceGrowth(p) = &mut policy {
            p.steps_per_month = steps_per_month;
        }
        policies.push(policy);
    }

    let mut scheduled_events = Vec::new();
    for event_id in &world_system.active_event_ids {
        let doc = store
            .get("events", event_id)?
            .ok_or_else(|| ProximaError::Config(format!("event {event_id} not found")))?;
        let event: EventDoc = parse_config(doc, "event")?;
        let payload = parse_config(event.event, "event payload")?;
        scheduled_events.push(ScheduledEvent {
            t: event.t,
            payload,
        });
    }

    let evaluation = EvaluationEngine::new(
        environment.metrics,
        goals,
        environment.dust_decay_per_step,
        steps_per_month,
    );

    let config = WorldConfig {
        experiment_id: experiment.id.clone(),
        steps_per_month,
        commit_mode: experiment.commit_mode.unwrap_or(CommitMode::Strict),
        scheduled_events,
        energy: EnergySector::new(energy_config, components.generators, components.storages),
        science: ScienceSector::new(science_config, components.rovers),
        manufacturing: ManufacturingSector::new(manufacturing_config, components.isru_agents),
        equipment: EquipmentSector::new(equipment_config),
        transportation: TransportationSector::new(
            transportation_config,
            components.rockets,
            components.fuel_generators,
        ),
        construction: ConstructionSector::new(
            construction_config,
            components.printing_robots,
            components.assembly_robots,
        ),
        evaluation,
        policy: PolicyEngine::new(policies),
    };

    let seed = experiment.seed.unwrap_or(0);
    Ok(BuildOutput {
        world: World::new(config, seed),
        world_system_id: experiment.world_system_id,
        simulation_time_steps: experiment.simulation_time_steps,
        log_skip_steps: experiment.log_skip_steps.unwrap_or(DEFAULT_LOG_SKIP_STEPS),
    })
}
