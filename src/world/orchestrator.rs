//! The step pipeline
//!
//! One step, in fixed order: deliver buffered events, evaluate metrics,
//! apply policies, compute the goal-weighted sector priority vector,
//! allocate power, step every sector, commit the stock flow ledger, then
//! aggregate metrics for the next evaluation. Nothing preempts anything;
//! determinism comes from the fixed order plus the step-seeded RNG.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::rng::StepRng;
use crate::core::types::{Location, SectorId, Step};
use crate::evaluation::{EvaluationEngine, EvaluationResult};
use crate::events::{Event, EventBus, EventPayload, Topic};
use crate::ledger::{CommitMode, Ledger, Stocks};
use crate::policy::PolicyEngine;
use crate::sectors::{
    ConstructionSector, EnergySector, EquipmentSector, ManufacturingSector, ScienceSector,
    SectorMetrics, StepContext, TransportationSector,
};
use crate::world::WorldMutator;

/// An event from the experiment's script, injected at a fixed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub t: Step,
    pub payload: EventPayload,
}

/// Everything the builder resolves before a world can start.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    pub experiment_id: String,
    pub steps_per_month: u64,
    pub commit_mode: CommitMode,
    pub scheduled_events: Vec<ScheduledEvent>,
    pub energy: EnergySector,
    pub science: ScienceSector,
    pub manufacturing: ManufacturingSector,
    pub equipment: EquipmentSector,
    pub transportation: TransportationSector,
    pub construction: ConstructionSector,
    pub evaluation: EvaluationEngine,
    pub policy: PolicyEngine,
}

/// What a single step produced, for logging and control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub t: Step,
    pub evaluation: EvaluationResult,
    pub policy_effects: BTreeMap<String, serde_json::Value>,
    pub sector_metrics: BTreeMap<SectorId, SectorMetrics>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub experiment_id: String,
    pub run_seed: u64,
    pub t: Step,
    pub steps_per_month: u64,
    pub commit_mode: CommitMode,
    pub bus: EventBus,
    pub ledger: Ledger,
    pub energy: EnergySector,
    pub science: ScienceSector,
    pub manufacturing: ManufacturingSector,
    pub equipment: EquipmentSector,
    pub transportation: TransportationSector,
    pub construction: ConstructionSector,
    pub evaluation: EvaluationEngine,
    pub policy: PolicyEngine,
    /// Script events not yet injected.
    pub scheduled_events: Vec<ScheduledEvent>,
    /// Sector metrics aggregated at the end of the previous step; the next
    /// evaluation folds these in, so policies always see step `t-1`.
    pub last_sector_metrics: BTreeMap<SectorId, SectorMetrics>,
}

impl World {
    pub fn new(config: WorldConfig, run_seed: u64) -> Self {
        let mut bus = EventBus::new();
        // Subscription registry; registration order is delivery order.
        bus.subscribe(Topic::ResourceRequest, SectorId::Manufacturing);
        bus.subscribe(Topic::ConstructionRequest, SectorId::Construction);
        bus.subscribe(Topic::EquipmentAllocated, SectorId::Construction);
        bus.subscribe(Topic::ResourceAllocated, SectorId::Construction);
        bus.subscribe(Topic::EquipmentRequest, SectorId::EquipmentManufacturing);
        bus.subscribe(Topic::PayloadDelivered, SectorId::EquipmentManufacturing);
        bus.subscribe(Topic::TransportRequest, SectorId::Transportation);
        bus.subscribe(Topic::ResourceAllocated, SectorId::Transportation);
        bus.subscribe(Topic::ModuleCompleted, SectorId::Science);

        Self {
            experiment_id: config.experiment_id,
            run_seed,
            t: 0,
            steps_per_month: config.steps_per_month,
            commit_mode: config.commit_mode,
            bus,
            ledger: Ledger::new(),
            energy: config.energy,
            science: config.science,
            manufacturing: config.manufacturing,
            equipment: config.equipment,
            transportation: config.transportation,
            construction: config.construction,
            evaluation: config.evaluation,
            policy: config.policy,
            scheduled_events: config.scheduled_events,
            last_sector_metrics: BTreeMap::new(),
        }
    }

    /// Goal-weighted sector priorities for power allocation.
    ///
    /// Every consumer starts at a baseline of 1. Each active goal adds
    /// `weight * (1 - score)` spread over the sectors that contributed to
    /// its metric last step, so a missed goal pulls power toward whoever
    /// moves that metric.
    fn sector_priorities(&self, evaluation: &EvaluationResult) -> BTreeMap<SectorId, f64> {
        let mut priorities: BTreeMap<SectorId, f64> =
            SectorId::CONSUMERS.iter().map(|id| (*id, 1.0)).collect();
        for score in evaluation.scores.values() {
            let need = score.weight * (1.0 - score.score);
            if need <= 0.0 {
                continue;
            }
            for (sector, share) in self.evaluation.contribution_shares(&score.metric_id) {
                if let Some(priority) = priorities.get_mut(&sector) {
                    *priority += need * share;
                }
            }
        }
        priorities
    }

    fn power_demands(&self) -> BTreeMap<SectorId, f64> {
        [
            (SectorId::Science, self.science.power_demand()),
            (SectorId::Manufacturing, self.manufacturing.power_demand()),
            (
                SectorId::EquipmentManufacturing,
                self.equipment.power_demand(),
            ),
            (SectorId::Transportation, self.transportation.power_demand()),
            (SectorId::Construction, self.construction.power_demand()),
        ]
        .into_iter()
        .collect()
    }

    /// Execute one full simulation step.
    pub fn step(&mut self) -> Result<StepReport> {
        let t = self.t;
        let mut rng = StepRng::new(self.run_seed, t);
        let mut errors: Vec<String> = Vec::new();

        // 1. Deliver events published last step, plus any script events due
        // at this step.
        self.bus.swap();
        let mut events = self.bus.take_current();
        let mut remaining = Vec::new();
        for scheduled in std::mem::take(&mut self.scheduled_events) {
            if scheduled.t <= t {
                events.push(Event::new(scheduled.payload));
            } else {
                remaining.push(scheduled);
            }
        }
        self.scheduled_events = remaining;
        for event in &events {
            for subscriber in self.bus.subscribers(event.topic) {
                let mut ctx = StepContext {
                    t,
                    rng: &mut rng,
                    bus: &mut self.bus,
                    ledger: &mut self.ledger,
                };
                let delivery = match subscriber {
                    SectorId::Manufacturing => self.manufacturing.handle_event(event, &mut ctx),
                    SectorId::Construction => self.construction.handle_event(event, &mut ctx),
                    SectorId::EquipmentManufacturing => {
                        self.equipment.handle_event(event, &mut ctx)
                    }
                    SectorId::Transportation => self.transportation.handle_event(event, &mut ctx),
                    SectorId::Science => self.science.handle_event(event, &mut ctx),
                    SectorId::Energy => Ok(()),
                };
                if let Err(error) = delivery {
                    // Other subscribers still get the event; no redelivery.
                    errors.push(error.to_string());
                }
            }
            // Equipment deliveries also move stock.
            if let EventPayload::PayloadDelivered {
                destination: Location::Moon,
                payload,
                ..
            } = &event.payload
            {
                let mut ctx = StepContext {
                    t,
                    rng: &mut rng,
                    bus: &mut self.bus,
                    ledger: &mut self.ledger,
                };
                self.equipment.receive_payload(payload, &mut ctx);
            }
        }
        self.policy.observe_events(&events);

        // 2. Evaluate the metrics aggregated at the end of last step.
        let evaluation = self.evaluation.evaluate(&self.last_sector_metrics, t);

        // 3. Apply policies; their effects are live for this step.
        let policy_effects = {
            let mut mutator = WorldMutator::new(
                t,
                &mut self.bus,
                &mut self.science,
                &mut self.manufacturing,
            );
            self.policy.apply_policies(&mut mutator, &evaluation)
        };

        // 4-5. Priorities, demands, power allocation.
        let priorities = self.sector_priorities(&evaluation);
        let demands = self.power_demands();
        let allocations = self.energy.allocate(&demands, &priorities);

        // 6. Step sectors in canonical order.
        {
            let allocation = |id: SectorId| allocations.get(&id).copied().unwrap_or(0.0);
            let mut ctx = StepContext {
                t,
                rng: &mut rng,
                bus: &mut self.bus,
                ledger: &mut self.ledger,
            };
            self.science.step(allocation(SectorId::Science), &mut ctx);
            self.manufacturing
                .step(allocation(SectorId::Manufacturing), &mut ctx);
            self.equipment
                .step(allocation(SectorId::EquipmentManufacturing), &mut ctx);
            self.transportation
                .step(allocation(SectorId::Transportation), &mut ctx);
            self.construction
                .step(allocation(SectorId::Construction), &mut ctx);
        }

        // 7. Commit all stock flows atomically.
        let mut stocks: BTreeMap<SectorId, &mut Stocks> = BTreeMap::new();
        stocks.insert(SectorId::Manufacturing, &mut self.manufacturing.stocks);
        stocks.insert(SectorId::Construction, &mut self.construction.stocks);
        stocks.insert(
            SectorId::EquipmentManufacturing,
            &mut self.equipment.stocks,
        );
        stocks.insert(SectorId::Transportation, &mut self.transportation.stocks);
        // A strict-mode overdraft propagates out of the step as fatal.
        let outcome = self.ledger.commit(&mut stocks, self.commit_mode)?;
        drop(stocks);
        for (sector, resource, delta) in &outcome.groups_dropped {
            errors.push(format!(
                "commit dropped {sector}/{resource} (net {delta:.3})"
            ));
        }

        // 8. Aggregate metrics for the next evaluation.
        let mut sector_metrics = BTreeMap::new();
        sector_metrics.insert(SectorId::Energy, self.energy.metrics());
        sector_metrics.insert(SectorId::Science, self.science.metrics());
        sector_metrics.insert(SectorId::Manufacturing, self.manufacturing.metrics());
        sector_metrics.insert(
            SectorId::EquipmentManufacturing,
            self.equipment.metrics(),
        );
        sector_metrics.insert(SectorId::Transportation, self.transportation.metrics());
        sector_metrics.insert(SectorId::Construction, self.construction.metrics());
        self.last_sector_metrics = sector_metrics.clone();

        self.t += 1;

        Ok(StepReport {
            t,
            evaluation,
            policy_effects,
            sector_metrics,
            errors,
        })
    }

    /// Serialize the full world state.
    pub fn dump(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Restore a world from a snapshot produced by [`World::dump`].
    pub fn load(snapshot: &str) -> Result<World> {
        Ok(serde_json::from_str(snapshot)?)
    }
}
