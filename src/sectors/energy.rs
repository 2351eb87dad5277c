//! Energy sector - generation, storage, and power allocation
//!
//! Generation is need-bounded: generators produce up to demand plus the
//! batteries' charging headroom. Demand unmet by generation is served from
//! storage; excess generation charges storage. What remains unmet is
//! reported as the `PWR-SHORTAGE-KW` metric.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agents::power::{PowerGenerator, PowerStorage};
use crate::core::constants::METRIC_POWER_SHORTAGE;
use crate::core::types::SectorId;
use crate::sectors::SectorMetrics;

/// Allocation strategy under scarcity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    /// Weighted by the goal-derived sector priority vector.
    #[default]
    Priority,
    /// Proportional to raw demand.
    Proportional,
    /// Equal split, capped at demand.
    Equal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EnergyConfig {
    pub allocation_mode: AllocationMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergySector {
    pub config: EnergyConfig,
    pub generators: Vec<PowerGenerator>,
    pub storages: Vec<PowerStorage>,
    pub power_supplied: f64,
    pub power_demanded: f64,
    pub power_shortage: f64,
}

impl EnergySector {
    pub fn new(
        config: EnergyConfig,
        generators: Vec<PowerGenerator>,
        storages: Vec<PowerStorage>,
    ) -> Self {
        Self {
            config,
            generators,
            storages,
            power_supplied: 0.0,
            power_demanded: 0.0,
            power_shortage: 0.0,
        }
    }

    pub fn total_charge(&self) -> f64 {
        self.storages.iter().map(|s| s.charge_level).sum()
    }

    pub fn total_capacity(&self) -> f64 {
        self.storages
            .iter()
            .map(|s| s.config.max_operational_cap_kwh)
            .sum()
    }

    /// Produce power for `power_demand` and return what could be supplied.
    fn supply(&mut self, power_demand: f64) -> f64 {
        self.power_demanded = power_demand;

        // Generating past demand is only useful up to the batteries' intake.
        let storage_headroom: f64 = self.storages.iter().map(|s| s.available_capacity()).sum();
        let max_useful = power_demand + storage_headroom / 0.95;

        let mut total_generated = 0.0;
        let mut remaining_useful = max_useful;
        for generator in &mut self.generators {
            let generated = generator.generate(remaining_useful);
            total_generated += generated;
            remaining_useful -= generated;
            if remaining_useful <= 0.0 {
                break;
            }
        }

        let from_generation = total_generated.min(power_demand);
        let mut remaining_demand = power_demand - from_generation;

        let mut discharged = 0.0;
        if remaining_demand > 0.0 {
            for storage in &mut self.storages {
                if remaining_demand <= 0.0 {
                    break;
                }
                let delivered = storage.discharge(remaining_demand);
                discharged += delivered;
                remaining_demand -= delivered;
            }
        }

        self.power_supplied = from_generation + discharged;
        self.power_shortage = remaining_demand.max(0.0);

        // Unallocated generation charges the batteries.
        let mut excess = total_generated - from_generation;
        if excess > 0.0 {
            for storage in &mut self.storages {
                if excess <= 0.0 {
                    break;
                }
                excess -= storage.charge(excess);
            }
        }

        self.power_supplied
    }

    /// Allocate available power across the demand vector.
    ///
    /// `priorities` is the combined sector priority vector computed by the
    /// orchestrator from the active goals; it only matters under scarcity
    /// and in [`AllocationMode::Priority`].
    pub fn allocate(
        &mut self,
        demands: &BTreeMap<SectorId, f64>,
        priorities: &BTreeMap<SectorId, f64>,
    ) -> BTreeMap<SectorId, f64> {
        let demands: BTreeMap<SectorId, f64> = demands
            .iter()
            .map(|(id, d)| (*id, d.max(0.0)))
            .collect();
        let total_demand: f64 = demands.values().sum();
        let available = self.supply(total_demand);

        if total_demand <= 0.0 || available <= 0.0 {
            return demands.keys().map(|id| (*id, 0.0)).collect();
        }
        if total_demand <= available {
            return demands;
        }

        match self.config.allocation_mode {
            AllocationMode::Proportional => {
                let ratio = available / total_demand;
                demands.iter().map(|(id, d)| (*id, ratio * d)).collect()
            }
            AllocationMode::Equal => {
                let per_sector = available / demands.len() as f64;
                demands
                    .iter()
                    .map(|(id, d)| (*id, per_sector.min(*d)))
                    .collect()
            }
            AllocationMode::Priority => Self::allocate_by_priority(&demands, priorities, available),
        }
    }

    /// Water-fill by priority weight: each round splits the remaining power
    /// across still-unsatisfied sectors by priority share, capping at
    /// demand. Sectors with small demands release their surplus to the rest.
    fn allocate_by_priority(
        demands: &BTreeMap<SectorId, f64>,
        priorities: &BTreeMap<SectorId, f64>,
        available: f64,
    ) -> BTreeMap<SectorId, f64> {
        let mut allocations: BTreeMap<SectorId, f64> =
            demands.keys().map(|id| (*id, 0.0)).collect();
        let mut remaining = available;

        for _ in 0..demands.len() {
            let open: Vec<SectorId> = demands
                .iter()
                .filter(|(id, d)| allocations[id] < **d)
                .map(|(id, _)| *id)
                .collect();
            if open.is_empty() || remaining <= 1e-12 {
                break;
            }
            let weight_total: f64 = open
                .iter()
                .map(|id| priorities.get(id).copied().unwrap_or(1.0).max(0.0))
                .sum();
            if weight_total <= 0.0 {
                break;
            }
            let mut granted_this_round = 0.0;
            for id in &open {
                let weight = priorities.get(id).copied().unwrap_or(1.0).max(0.0);
                let offer = remaining * weight / weight_total;
                let grant = offer.min(demands[id] - allocations[id]);
                allocations.insert(*id, allocations[id] + grant);
                granted_this_round += grant;
            }
            remaining -= granted_this_round;
            if granted_this_round <= 1e-12 {
                break;
            }
        }
        allocations
    }

    pub fn metrics(&self) -> SectorMetrics {
        let mut metrics = SectorMetrics::default();
        metrics.gauge("total_power_supply_kw", self.power_supplied);
        metrics.gauge("total_power_need_kw", self.power_demanded);
        metrics.gauge("power_shortage_kw", self.power_shortage);
        metrics.gauge("total_charge_level_kwh", self.total_charge());
        metrics.gauge("total_charge_capacity_kwh", self.total_capacity());
        metrics.contribute(METRIC_POWER_SHORTAGE, self.power_shortage);
        metrics
    }
}
