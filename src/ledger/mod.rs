//! Stock flow ledger - atomic end-of-step resource accounting
//!
//! Agents and sectors never mutate stocks directly during a step; they emit
//! [`StockFlow`] records into the ledger. At the commit phase the ledger
//! nets all flows per `(sector, resource)` group and applies them together,
//! so a producer and a consumer of the same resource in the same step can
//! never race on ordering.

use std::collections::BTreeMap;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::constants::STOCK_EPSILON;
use crate::core::error::{ProximaError, Result};
use crate::core::types::{ResourceId, SectorId};

/// A sector's local resource inventory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stocks {
    map: AHashMap<ResourceId, f64>,
}

impl Stocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial<I: IntoIterator<Item = (String, f64)>>(initial: I) -> Self {
        Self {
            map: initial.into_iter().collect(),
        }
    }

    pub fn get(&self, resource: &str) -> f64 {
        self.map.get(resource).copied().unwrap_or(0.0)
    }

    pub fn has_at_least(&self, resource: &str, amount: f64) -> bool {
        self.get(resource) + STOCK_EPSILON >= amount
    }

    /// Direct write for build-time seeding and the ledger commit. In-step
    /// mutation goes through [`StockFlow`] records only.
    pub fn set(&mut self, resource: &str, value: f64) {
        self.map.insert(resource.to_string(), value.max(0.0));
    }

    /// Resources in sorted order, for deterministic iteration and logging.
    pub fn iter_sorted(&self) -> Vec<(&str, f64)> {
        let mut entries: Vec<(&str, f64)> =
            self.map.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

/// An atomic resource movement collected during a step.
///
/// `None` endpoints denote the outside world: production has no source,
/// consumption has no destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockFlow {
    pub source: Option<SectorId>,
    pub dest: Option<SectorId>,
    pub resource: ResourceId,
    pub amount: f64,
}

impl StockFlow {
    /// Move `amount` of `resource` from one sector to another.
    pub fn transfer(from: SectorId, to: SectorId, resource: &str, amount: f64) -> Self {
        Self {
            source: Some(from),
            dest: Some(to),
            resource: resource.to_string(),
            amount,
        }
    }

    /// Create `amount` of `resource` inside `sector`.
    pub fn produce(sector: SectorId, resource: &str, amount: f64) -> Self {
        Self {
            source: None,
            dest: Some(sector),
            resource: resource.to_string(),
            amount,
        }
    }

    /// Destroy `amount` of `resource` held by `sector`.
    pub fn consume(sector: SectorId, resource: &str, amount: f64) -> Self {
        Self {
            source: Some(sector),
            dest: None,
            resource: resource.to_string(),
            amount,
        }
    }
}

/// How an overdrawing commit group is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    /// Any overdraft aborts the whole commit (kernel treats this as fatal).
    Strict,
    /// Overdrawing groups are dropped; the rest of the batch applies.
    Lenient,
}

/// Result of a successful commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub groups_applied: usize,
    /// `(sector, resource, net_delta)` of groups rejected in lenient mode.
    pub groups_dropped: Vec<(SectorId, ResourceId, f64)>,
}

/// Pending flows for the current step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    pending: Vec<StockFlow>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, flow: StockFlow) {
        if flow.amount > 0.0 {
            self.pending.push(flow);
        }
    }

    pub fn record_all<I: IntoIterator<Item = StockFlow>>(&mut self, flows: I) {
        for flow in flows {
            self.record(flow);
        }
    }

    pub fn pending(&self) -> &[StockFlow] {
        &self.pending
    }

    /// Apply all pending flows to the sector stocks.
    ///
    /// Flows are netted per `(sector, resource)` group in sorted group order.
    /// In strict mode a prospective negative stock aborts the entire batch
    /// with [`ProximaError::CommitOverdraft`] and no stock changes. In
    /// lenient mode crediting groups apply first, then each debiting group
    /// applies only if the stock stays non-negative; rejected groups are
    /// reported in the outcome.
    pub fn commit(
        &mut self,
        stocks: &mut BTreeMap<SectorId, &mut Stocks>,
        mode: CommitMode,
    ) -> Result<CommitOutcome> {
        let flows = std::mem::take(&mut self.pending);

        let mut net: BTreeMap<(SectorId, ResourceId), f64> = BTreeMap::new();
        for flow in &flows {
            if let Some(source) = flow.source {
                *net.entry((source, flow.resource.clone())).or_insert(0.0) -= flow.amount;
            }
            if let Some(dest) = flow.dest {
                *net.entry((dest, flow.resource.clone())).or_insert(0.0) += flow.amount;
            }
        }

        if mode == CommitMode::Strict {
            for ((sector, resource), delta) in &net {
                let current = stocks
                    .get(sector)
                    .map(|s| s.get(resource))
                    .unwrap_or(0.0);
                let prospective = current + delta;
                if prospective < -STOCK_EPSILON {
                    return Err(ProximaError::CommitOverdraft {
                        sector: *sector,
                        resource: resource.clone(),
                        attempted: prospective,
                    });
                }
            }
        }

        let mut outcome = CommitOutcome::default();

        // Credits first so lenient debits see the step's production.
        for pass in 0..2 {
            for ((sector, resource), delta) in &net {
                let crediting = *delta >= 0.0;
                if (pass == 0) != crediting {
                    continue;
                }
                let Some(sector_stocks) = stocks.get_mut(sector) else {
                    outcome
                        .groups_dropped
                        .push((*sector, resource.clone(), *delta));
                    continue;
                };
                let prospective = sector_stocks.get(resource) + delta;
                if prospective < -STOCK_EPSILON {
                    // Only reachable in lenient mode.
                    outcome
                        .groups_dropped
                        .push((*sector, resource.clone(), *delta));
                    continue;
                }
                sector_stocks.set(resource, prospective.max(0.0));
                outcome.groups_applied += 1;
            }
        }

        Ok(outcome)
    }
}
