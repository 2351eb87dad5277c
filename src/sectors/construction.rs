//! Construction sector - shell printing and module assembly
//!
//! Two-stage pipeline. Shells are made to stock: any idle printing robot
//! starts a print whenever the shell store is below capacity. Modules are
//! made to order: a queued request starts only when both its shells and its
//! specialized equipment are on hand locally, then occupies an assembly
//! robot until `module_completed` is published.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agents::assembly_robot::AssemblyRobot;
use crate::agents::printing_robot::PrintingRobot;
use crate::core::constants::{DEFAULT_BACKLOG_MAX_AGE_STEPS, METRIC_BACKLOG_EXPIRED};
use crate::core::error::{ProximaError, Result};
use crate::core::types::{equipment_for_module, res, SectorId, Step};
use crate::events::{Event, EventPayload};
use crate::ledger::{StockFlow, Stocks};
use crate::sectors::{SectorMetrics, StepContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructionStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructionRequest {
    pub id: u64,
    pub requester: SectorId,
    pub module_id: String,
    pub status: ConstructionStatus,
    pub shells_needed: u32,
    pub equipment_needed: BTreeMap<String, u32>,
    /// Index into the assembly robot pool while in progress.
    pub assigned_robot: Option<usize>,
    pub equipment_requested: bool,
    pub enqueued_at: Step,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstructionConfig {
    pub max_concurrent_projects: usize,
    pub shell_storage_capacity: f64,
    pub initial_stocks: BTreeMap<String, f64>,
    /// Regolith level that triggers a refill request to manufacturing.
    pub regolith_reorder_level_kg: f64,
    pub regolith_reorder_amount_kg: f64,
    pub max_backlog_age_steps: u64,
}

impl Default for ConstructionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_projects: 3,
            shell_storage_capacity: 10.0,
            initial_stocks: BTreeMap::new(),
            regolith_reorder_level_kg: 400.0,
            regolith_reorder_amount_kg: 2000.0,
            max_backlog_age_steps: DEFAULT_BACKLOG_MAX_AGE_STEPS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructionSector {
    pub config: ConstructionConfig,
    pub stocks: Stocks,
    pub printing_robots: Vec<PrintingRobot>,
    pub assembly_robots: Vec<AssemblyRobot>,
    pub queue: Vec<ConstructionRequest>,
    next_request_id: u64,
    regolith_request_pending: bool,
    pub regolith_used_kg: f64,
    pub modules_completed_this_step: u32,
    pub shells_produced_this_step: u32,
    pub expired_this_step: u64,
}

impl ConstructionSector {
    pub fn new(
        config: ConstructionConfig,
        printing_robots: Vec<PrintingRobot>,
        assembly_robots: Vec<AssemblyRobot>,
    ) -> Self {
        let stocks = Stocks::with_initial(config.initial_stocks.clone());
        Self {
            config,
            stocks,
            printing_robots,
            assembly_robots,
            queue: Vec::new(),
            next_request_id: 0,
            regolith_request_pending: false,
            regolith_used_kg: 0.0,
            modules_completed_this_step: 0,
            shells_produced_this_step: 0,
            expired_this_step: 0,
        }
    }

    pub fn power_demand(&self) -> f64 {
        let printing: f64 = self
            .printing_robots
            .iter()
            .filter(|r| !r.lifecycle.is_retired())
            .map(|r| r.config.max_power_usage_kwh)
            .sum();
        let assembling: f64 = self
            .assembly_robots
            .iter()
            .filter(|r| r.is_assembling() || !self.queue.is_empty())
            .map(|r| r.config.max_power_usage_kwh)
            .sum();
        printing + assembling
    }

    pub fn handle_event(&mut self, event: &Event, ctx: &mut StepContext) -> Result<()> {
        match &event.payload {
            EventPayload::ConstructionRequest {
                requester,
                module_id,
                shell_quantity,
                quantity,
            } => {
                if *quantity == 0 || *shell_quantity == 0 {
                    return Err(ProximaError::EventDelivery {
                        topic: event.topic.as_str(),
                        sector: SectorId::Construction,
                        message: format!("empty construction request for {module_id}"),
                    });
                }
                let equipment_needed: BTreeMap<String, u32> = equipment_for_module(module_id)
                    .map(|eq| [(eq.to_string(), 1)].into_iter().collect())
                    .unwrap_or_default();
                for _ in 0..*quantity {
                    self.queue.push(ConstructionRequest {
                        id: self.next_request_id,
                        requester: *requester,
                        module_id: module_id.clone(),
                        status: ConstructionStatus::Queued,
                        shells_needed: *shell_quantity,
                        equipment_needed: equipment_needed.clone(),
                        assigned_robot: None,
                        equipment_requested: false,
                        enqueued_at: ctx.t,
                    });
                    self.next_request_id += 1;
                }
            }
            EventPayload::EquipmentAllocated {
                recipient,
                equipment_type,
                ..
            } if *recipient == SectorId::Construction => {
                // Allow a re-request if this delivery still leaves a gap.
                for request in &mut self.queue {
                    if request.equipment_needed.contains_key(equipment_type) {
                        request.equipment_requested = false;
                    }
                }
            }
            EventPayload::ResourceAllocated {
                recipient,
                resource,
                ..
            } if *recipient == SectorId::Construction && resource == res::REGOLITH => {
                self.regolith_request_pending = false;
            }
            _ => {}
        }
        Ok(())
    }

    fn expire_queue(&mut self, t: Step) {
        let max_age = self.config.max_backlog_age_steps;
        let before = self.queue.len();
        self.queue.retain(|request| {
            request.status != ConstructionStatus::Queued
                || t.saturating_sub(request.enqueued_at) <= max_age
        });
        self.expired_this_step = (before - self.queue.len()) as u64;
    }

    fn manage_printing(&mut self, remaining_power: &mut f64, ctx: &mut StepContext) {
        let mut regolith_spent = 0.0;
        for robot in &mut self.printing_robots {
            if !robot.lifecycle.begin_step() {
                continue;
            }
            if robot.lifecycle.is_idle()
                && self.stocks.get(res::SHELLS) < self.config.shell_storage_capacity
            {
                robot.start_printing();
            }
            let demand = robot.power_demand();
            let power_ok = demand > 0.0 && *remaining_power >= demand;
            let regolith_ok = self
                .stocks
                .has_at_least(res::REGOLITH, regolith_spent + robot.config.regolith_usage_kg);
            let result = robot.step(power_ok, regolith_ok);
            *remaining_power -= result.power_used;
            if result.shell_produced {
                ctx.ledger
                    .record(StockFlow::produce(SectorId::Construction, res::SHELLS, 1.0));
                ctx.ledger.record(StockFlow::consume(
                    SectorId::Construction,
                    res::REGOLITH,
                    result.regolith_consumed,
                ));
                regolith_spent += result.regolith_consumed;
                self.regolith_used_kg += result.regolith_consumed;
                self.shells_produced_this_step += 1;
            }
        }

        if !self.regolith_request_pending
            && self.stocks.get(res::REGOLITH) < self.config.regolith_reorder_level_kg
        {
            ctx.bus.publish(EventPayload::ResourceRequest {
                requester: SectorId::Construction,
                resource: res::REGOLITH.to_string(),
                amount: self.config.regolith_reorder_amount_kg,
            });
            self.regolith_request_pending = true;
        }
    }

    fn process_queue(&mut self, remaining_power: &mut f64, ctx: &mut StepContext) {
        for robot in &mut self.assembly_robots {
            robot.lifecycle.begin_step();
        }

        // Stock checks below see end-of-last-step values; reservations keep
        // two requests from spending the same shell in one step.
        let mut reserved: BTreeMap<String, f64> = BTreeMap::new();
        let mut active_projects = 0usize;

        for index in 0..self.queue.len() {
            if active_projects >= self.config.max_concurrent_projects {
                break;
            }
            match self.queue[index].status {
                ConstructionStatus::Queued => {
                    if self.try_start_project(index, &mut reserved, ctx) {
                        active_projects += 1;
                    }
                }
                ConstructionStatus::InProgress => {
                    self.advance_project(index, remaining_power, ctx);
                    active_projects += 1;
                }
                _ => {}
            }
        }

        self.queue
            .retain(|request| request.status != ConstructionStatus::Completed);
    }

    fn try_start_project(
        &mut self,
        index: usize,
        reserved: &mut BTreeMap<String, f64>,
        ctx: &mut StepContext,
    ) -> bool {
        let available = |stocks: &Stocks, reserved: &BTreeMap<String, f64>, resource: &str| {
            stocks.get(resource) - reserved.get(resource).copied().unwrap_or(0.0)
        };

        let request = &self.queue[index];
        let missing: BTreeMap<String, u32> = request
            .equipment_needed
            .iter()
            .filter(|(eq, qty)| available(&self.stocks, reserved, eq) < **qty as f64)
            .map(|(eq, qty)| (eq.clone(), *qty))
            .collect();

        if !missing.is_empty() {
            if !request.equipment_requested {
                for (equipment_type, quantity) in &missing {
                    ctx.bus.publish(EventPayload::EquipmentRequest {
                        requester: SectorId::Construction,
                        equipment_type: equipment_type.clone(),
                        quantity: *quantity,
                    });
                }
                self.queue[index].equipment_requested = true;
            }
            return false;
        }

        if available(&self.stocks, reserved, res::SHELLS) < request.shells_needed as f64 {
            return false;
        }

        let Some(robot_index) = self
            .assembly_robots
            .iter()
            .position(|r| r.lifecycle.is_idle())
        else {
            return false;
        };

        let request = &mut self.queue[index];
        if !self.assembly_robots[robot_index].start_assembly(&request.module_id) {
            return false;
        }

        // Consume inputs now; the flows commit with the step.
        ctx.ledger.record(StockFlow::consume(
            SectorId::Construction,
            res::SHELLS,
            request.shells_needed as f64,
        ));
        *reserved.entry(res::SHELLS.to_string()).or_insert(0.0) += request.shells_needed as f64;
        for (equipment_type, quantity) in &request.equipment_needed {
            ctx.ledger.record(StockFlow::consume(
                SectorId::Construction,
                equipment_type,
                *quantity as f64,
            ));
            *reserved.entry(equipment_type.clone()).or_insert(0.0) += *quantity as f64;
        }

        request.assigned_robot = Some(robot_index);
        request.status = ConstructionStatus::InProgress;
        true
    }

    fn advance_project(&mut self, index: usize, remaining_power: &mut f64, ctx: &mut StepContext) {
        let Some(robot_index) = self.queue[index].assigned_robot else {
            self.queue[index].status = ConstructionStatus::Failed;
            return;
        };
        let robot = &mut self.assembly_robots[robot_index];
        let demand = robot.power_demand();
        let power_ok = demand > 0.0 && *remaining_power >= demand;
        if power_ok {
            *remaining_power -= demand;
        }

        if let Some(module_id) = robot.step(power_ok) {
            let request = &mut self.queue[index];
            request.status = ConstructionStatus::Completed;
            request.assigned_robot = None;
            self.modules_completed_this_step += 1;
            ctx.bus.publish(EventPayload::ModuleCompleted {
                recipient: request.requester,
                module_id,
                quantity: 1,
            });
        }
    }

    pub fn step(&mut self, power: f64, ctx: &mut StepContext) {
        self.modules_completed_this_step = 0;
        self.shells_produced_this_step = 0;

        self.expire_queue(ctx.t);

        let mut remaining_power = power;
        self.manage_printing(&mut remaining_power, ctx);
        self.process_queue(&mut remaining_power, ctx);
    }

    pub fn metrics(&self) -> SectorMetrics {
        let mut metrics = SectorMetrics::default();
        metrics.gauge("queued_requests", self.queue.len() as f64);
        metrics.gauge("shells_in_stock", self.stocks.get(res::SHELLS));
        metrics.gauge("regolith_used_kg", self.regolith_used_kg);
        metrics.gauge(
            "modules_completed_this_step",
            self.modules_completed_this_step as f64,
        );
        metrics.gauge(
            "shells_produced_this_step",
            self.shells_produced_this_step as f64,
        );
        for (resource, amount) in self.stocks.iter_sorted() {
            if resource.ends_with("_EQ") {
                metrics.gauge(&format!("equipment_{resource}"), amount);
            }
        }
        metrics.contribute(METRIC_BACKLOG_EXPIRED, self.expired_this_step as f64);
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::assembly_robot::AssemblyRobotConfig;
    use crate::agents::printing_robot::PrintingRobotConfig;
    use crate::core::rng::StepRng;
    use crate::events::{EventBus, Topic};
    use crate::ledger::Ledger;

    fn construction_request(quantity: u32) -> Event {
        Event::new(EventPayload::ConstructionRequest {
            requester: SectorId::Science,
            module_id: "comp_science_rover".to_string(),
            shell_quantity: 1,
            quantity,
        })
    }

    fn run_step(sector: &mut ConstructionSector, t: Step, power: f64) -> (EventBus, Ledger) {
        let mut rng = StepRng::new(9, t);
        let mut bus = EventBus::new();
        let mut ledger = Ledger::new();
        {
            let mut ctx = StepContext {
                t,
                rng: &mut rng,
                bus: &mut bus,
                ledger: &mut ledger,
            };
            sector.step(power, &mut ctx);
        }
        (bus, ledger)
    }

    fn deliver(sector: &mut ConstructionSector, event: &Event, t: Step) {
        let mut rng = StepRng::new(9, t);
        let mut bus = EventBus::new();
        let mut ledger = Ledger::new();
        let mut ctx = StepContext {
            t,
            rng: &mut rng,
            bus: &mut bus,
            ledger: &mut ledger,
        };
        sector.handle_event(event, &mut ctx).unwrap();
    }

    fn sector_with_robots(assembly_steps: u64) -> ConstructionSector {
        ConstructionSector::new(
            ConstructionConfig {
                initial_stocks: [
                    (res::REGOLITH.to_string(), 10_000.0),
                    (res::SHELLS.to_string(), 5.0),
                    ("Science_Rover_EQ".to_string(), 1.0),
                ]
                .into_iter()
                .collect(),
                ..ConstructionConfig::default()
            },
            vec![PrintingRobot::new(PrintingRobotConfig {
                processing_time_steps: 2,
                ..PrintingRobotConfig::default()
            })],
            vec![AssemblyRobot::new(AssemblyRobotConfig {
                assembly_time_steps: assembly_steps,
                ..AssemblyRobotConfig::default()
            })],
        )
    }

    #[test]
    fn test_project_starts_when_inputs_on_hand() {
        let mut sector = sector_with_robots(2);
        deliver(&mut sector, &construction_request(1), 0);

        let (_, ledger) = run_step(&mut sector, 0, 1000.0);
        assert_eq!(sector.queue[0].status, ConstructionStatus::InProgress);
        // Shell and equipment consumption flows were recorded.
        assert!(ledger
            .pending()
            .iter()
            .any(|f| f.resource == res::SHELLS && f.source == Some(SectorId::Construction)));
        assert!(ledger
            .pending()
            .iter()
            .any(|f| f.resource == "Science_Rover_EQ"));
    }

    #[test]
    fn test_missing_equipment_requests_once() {
        let mut sector = sector_with_robots(2);
        sector.stocks.set("Science_Rover_EQ", 0.0);
        deliver(&mut sector, &construction_request(1), 0);

        let (mut bus, _) = run_step(&mut sector, 0, 1000.0);
        bus.swap();
        let requests: Vec<_> = bus
            .take_current()
            .into_iter()
            .filter(|e| e.topic == Topic::EquipmentRequest)
            .collect();
        assert_eq!(requests.len(), 1);

        // Second step without delivery: still queued, no duplicate request.
        let (mut bus, _) = run_step(&mut sector, 1, 1000.0);
        bus.swap();
        assert!(bus
            .take_current()
            .iter()
            .all(|e| e.topic != Topic::EquipmentRequest));
        assert_eq!(sector.queue[0].status, ConstructionStatus::Queued);
    }

    #[test]
    fn test_module_completed_published() {
        let mut sector = sector_with_robots(2);
        deliver(&mut sector, &construction_request(1), 0);

        run_step(&mut sector, 0, 1000.0); // starts
        run_step(&mut sector, 1, 1000.0); // 1 of 2 assembly steps
        let (mut bus, _) = run_step(&mut sector, 2, 1000.0); // completes

        bus.swap();
        let completed: Vec<_> = bus
            .take_current()
            .into_iter()
            .filter(|e| e.topic == Topic::ModuleCompleted)
            .collect();
        assert_eq!(completed.len(), 1);
        assert_eq!(sector.modules_completed_this_step, 1);
        assert!(sector.queue.is_empty());
        assert!(sector.assembly_robots[0].lifecycle.is_idle());
    }

    #[test]
    fn test_shells_print_to_stock_cap() {
        let mut sector = sector_with_robots(2);
        sector.stocks.set(res::SHELLS, 10.0); // at capacity
        run_step(&mut sector, 0, 1000.0);
        assert!(!sector.printing_robots[0].is_printing());

        sector.stocks.set(res::SHELLS, 3.0);
        run_step(&mut sector, 1, 1000.0);
        assert!(sector.printing_robots[0].is_printing());
    }

    #[test]
    fn test_regolith_reorder_is_idempotent() {
        let mut sector = sector_with_robots(2);
        sector.stocks.set(res::REGOLITH, 100.0);

        let (mut bus, _) = run_step(&mut sector, 0, 1000.0);
        bus.swap();
        assert_eq!(
            bus.take_current()
                .iter()
                .filter(|e| e.topic == Topic::ResourceRequest)
                .count(),
            1
        );

        // Still low, still pending: no second request.
        let (mut bus, _) = run_step(&mut sector, 1, 1000.0);
        bus.swap();
        assert_eq!(
            bus.take_current()
                .iter()
                .filter(|e| e.topic == Topic::ResourceRequest)
                .count(),
            0
        );
    }

    #[test]
    fn test_concurrent_project_cap() {
        let mut sector = sector_with_robots(2);
        sector.assembly_robots = (0..5)
            .map(|_| {
                AssemblyRobot::new(AssemblyRobotConfig {
                    assembly_time_steps: 10,
                    ..AssemblyRobotConfig::default()
                })
            })
            .collect();
        sector.stocks.set(res::SHELLS, 10.0);
        sector.stocks.set("Science_Rover_EQ", 10.0);
        deliver(&mut sector, &construction_request(5), 0);

        run_step(&mut sector, 0, 10_000.0);
        let in_progress = sector
            .queue
            .iter()
            .filter(|r| r.status == ConstructionStatus::InProgress)
            .count();
        assert_eq!(in_progress, 3); // max_concurrent_projects
    }
}
