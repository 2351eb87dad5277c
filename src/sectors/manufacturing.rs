//! Manufacturing sector - ISRU operations and resource fulfillment
//!
//! Task selection is deficiency-driven: buffer targets on the sector stocks
//! translate into per-mode priorities, and the deficit-round-robin scheduler
//! turns those into one task assignment per step. Incoming resource requests
//! from other sectors are served newest-first from stock; what cannot be
//! served waits in the backlog and is retried every step until it expires.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agents::isru::{He3Concentration, IsruAgent, IsruMode};
use crate::agents::lifecycle::AgentState;
use crate::core::constants::{DEFAULT_BACKLOG_MAX_AGE_STEPS, METRIC_BACKLOG_EXPIRED};
use crate::core::error::{ProximaError, Result};
use crate::core::types::{BufferTarget, SectorId};
use crate::events::{Event, EventPayload};
use crate::ledger::{StockFlow, Stocks};
use crate::sectors::{Backlog, DrrScheduler, SectorMetrics, StepContext};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManufacturingConfig {
    pub buffer_targets: BTreeMap<String, BufferTarget>,
    pub initial_stocks: BTreeMap<String, f64>,
    pub max_backlog_age_steps: u64,
    /// Per-agent chance of a hardware fault per step.
    pub fault_chance: f64,
    pub he3_concentration: He3Concentration,
}

impl Default for ManufacturingConfig {
    fn default() -> Self {
        Self {
            buffer_targets: BTreeMap::new(),
            initial_stocks: BTreeMap::new(),
            max_backlog_age_steps: DEFAULT_BACKLOG_MAX_AGE_STEPS,
            fault_chance: 0.0,
            he3_concentration: He3Concentration::default(),
        }
    }
}

/// A queued resource request from another sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequestItem {
    pub requester: SectorId,
    pub resource: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManufacturingSector {
    pub config: ManufacturingConfig,
    pub stocks: Stocks,
    pub agents: Vec<IsruAgent>,
    pub scheduler: DrrScheduler,
    pub backlog: Backlog<ResourceRequestItem>,
    pub throttle_factor: f64,
    pub step_power_consumed: f64,
    pub total_power_consumed: f64,
    pub active_operations: u32,
    pub backlog_expired_this_step: u64,
}

impl ManufacturingSector {
    pub fn new(config: ManufacturingConfig, agents: Vec<IsruAgent>) -> Self {
        let stocks = Stocks::with_initial(config.initial_stocks.clone());
        // Schedule over every mode some agent supports, in mode order.
        let tasks: Vec<IsruMode> = IsruMode::ALL
            .iter()
            .copied()
            .filter(|mode| agents.iter().any(|a| a.supports(*mode)))
            .collect();
        Self {
            config,
            stocks,
            agents,
            scheduler: DrrScheduler::new(tasks),
            backlog: Backlog::new(),
            throttle_factor: 0.0,
            step_power_consumed: 0.0,
            total_power_consumed: 0.0,
            active_operations: 0,
            backlog_expired_this_step: 0,
        }
    }

    pub fn set_throttle_factor(&mut self, factor: f64) {
        self.throttle_factor = factor.clamp(0.0, 1.0);
    }

    pub fn power_demand(&self) -> f64 {
        // Worst case: every non-retired agent runs its most expensive mode.
        self.agents
            .iter()
            .filter(|a| !a.lifecycle.is_retired())
            .map(|a| {
                a.config
                    .modes
                    .iter()
                    .map(|m| a.power_for(*m))
                    .fold(0.0, f64::max)
            })
            .sum()
    }

    pub fn handle_event(&mut self, event: &Event, ctx: &mut StepContext) -> Result<()> {
        if let EventPayload::ResourceRequest {
            requester,
            resource,
            amount,
        } = &event.payload
        {
            if *amount <= 0.0 {
                return Err(ProximaError::EventDelivery {
                    topic: event.topic.as_str(),
                    sector: SectorId::Manufacturing,
                    message: format!("non-positive resource request: {amount}"),
                });
            }
            self.backlog.push(
                ResourceRequestItem {
                    requester: *requester,
                    resource: resource.clone(),
                    amount: *amount,
                },
                ctx.t,
            );
        }
        Ok(())
    }

    /// Mode priorities from buffer-target deficiencies.
    fn priorities(&self) -> BTreeMap<IsruMode, f64> {
        IsruMode::ALL
            .iter()
            .map(|mode| {
                let resource = mode.output_resource();
                let priority = self
                    .config
                    .buffer_targets
                    .get(resource)
                    .map(|target| target.deficiency(self.stocks.get(resource)))
                    .unwrap_or(0.0);
                (*mode, priority)
            })
            .collect()
    }

    /// A task is available when an idle capable agent exists, its inputs are
    /// on hand, and the sector has any power budget at all.
    fn availability(&self, power: f64) -> BTreeMap<IsruMode, bool> {
        IsruMode::ALL
            .iter()
            .map(|mode| {
                let has_agent = self
                    .agents
                    .iter()
                    .any(|a| a.lifecycle.is_idle() && a.supports(*mode));
                let inputs_ok = self
                    .agents
                    .iter()
                    .find(|a| a.supports(*mode))
                    .and_then(|a| a.input_for(*mode))
                    .map(|(resource, amount)| self.stocks.has_at_least(resource, amount))
                    .unwrap_or(true);
                (*mode, has_agent && inputs_ok && power > 0.0)
            })
            .collect()
    }

    /// Serve backlog LIFO against stock, emitting a transfer flow and a
    /// `resource_allocated` event per fulfilled request.
    fn fulfill_requests(&mut self, ctx: &mut StepContext) {
        let mut promised: BTreeMap<String, f64> = BTreeMap::new();
        let stocks = &self.stocks;
        let mut fulfilled: Vec<ResourceRequestItem> = Vec::new();
        self.backlog.drain_lifo(|item| {
            let already_promised = promised.get(&item.resource).copied().unwrap_or(0.0);
            if stocks.get(&item.resource) - already_promised >= item.amount {
                *promised.entry(item.resource.clone()).or_insert(0.0) += item.amount;
                fulfilled.push(item.clone());
                true
            } else {
                false
            }
        });
        for item in fulfilled {
            ctx.ledger.record(StockFlow::transfer(
                SectorId::Manufacturing,
                item.requester,
                &item.resource,
                item.amount,
            ));
            ctx.bus.publish(EventPayload::ResourceAllocated {
                recipient: item.requester,
                resource: item.resource,
                amount: item.amount,
            });
        }
    }

    pub fn step(&mut self, power: f64, ctx: &mut StepContext) {
        self.step_power_consumed = 0.0;
        self.active_operations = 0;

        self.backlog_expired_this_step = self
            .backlog
            .expire(ctx.t, self.config.max_backlog_age_steps) as u64;

        self.fulfill_requests(ctx);

        // One scheduling turn per step.
        let priorities = self.priorities();
        let availability = self.availability(power);
        let winner = self.scheduler.select(&priorities, &availability);
        if let Some(mode) = winner {
            if let Some(agent) = self
                .agents
                .iter_mut()
                .find(|a| a.lifecycle.is_idle() && a.supports(mode))
            {
                agent.mode = Some(mode);
                agent.lifecycle.state = AgentState::Active;
            }
        }

        let mut winner_worked = false;
        let mut remaining_power = power;
        let he3 = self.config.he3_concentration;
        for agent in &mut self.agents {
            if !agent.lifecycle.begin_step() {
                continue;
            }
            if self.config.fault_chance > 0.0 && ctx.rng.chance(self.config.fault_chance) {
                agent.lifecycle.fault();
                agent.mode = None;
                continue;
            }
            if agent.mode.is_none() {
                continue;
            }
            if ctx.rng.chance(self.throttle_factor) {
                agent.lifecycle.state = AgentState::Throttled;
                agent.mode = None;
                continue;
            }
            let assigned_mode = agent.mode;
            let allocation = remaining_power.min(
                assigned_mode.map(|m| agent.power_for(m)).unwrap_or(0.0),
            );
            if let Some(production) = agent.run(allocation, &self.stocks, he3, ctx.rng) {
                for (resource, amount) in &production.inputs {
                    ctx.ledger
                        .record(StockFlow::consume(SectorId::Manufacturing, resource, *amount));
                }
                for (resource, amount) in &production.outputs {
                    ctx.ledger
                        .record(StockFlow::produce(SectorId::Manufacturing, resource, *amount));
                }
                remaining_power -= production.power_used;
                self.step_power_consumed += production.power_used;
                self.active_operations += 1;
                if assigned_mode == winner {
                    winner_worked = true;
                }
            }
        }
        if let Some(mode) = winner {
            self.scheduler.spend(mode, winner_worked);
        }

        self.total_power_consumed += self.step_power_consumed;
    }

    pub fn metrics(&self) -> SectorMetrics {
        let mut metrics = SectorMetrics::default();
        metrics.gauge("power_consumed", self.step_power_consumed);
        metrics.gauge("total_power_consumed", self.total_power_consumed);
        metrics.gauge("active_operations", self.active_operations as f64);
        metrics.gauge("backlog_len", self.backlog.len() as f64);
        for (resource, amount) in self.stocks.iter_sorted() {
            metrics.gauge(&format!("stock_{resource}"), amount);
        }
        metrics.contribute(METRIC_BACKLOG_EXPIRED, self.backlog_expired_this_step as f64);
        metrics
    }
}
