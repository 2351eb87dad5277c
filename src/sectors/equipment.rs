//! Equipment manufacturing sector - logistics hub for specialized equipment
//!
//! Pure inventory logic: physical stock on hand plus pending orders in
//! transit. Resupply triggers on *effective* stock (physical + pending), and
//! a freshly published transport request bumps pending orders immediately,
//! which is exactly what keeps duplicate orders from going out while a
//! shipment is still flying.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::constants::{DEFAULT_BACKLOG_MAX_AGE_STEPS, METRIC_BACKLOG_EXPIRED};
use crate::core::error::{ProximaError, Result};
use crate::core::types::{Location, SectorId};
use crate::events::{Event, EventPayload};
use crate::ledger::{StockFlow, Stocks};
use crate::sectors::{Backlog, SectorMetrics, StepContext};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquipmentConfig {
    pub initial_stocks: BTreeMap<String, f64>,
    /// Minimum effective stock per equipment type.
    pub minimum_levels: BTreeMap<String, f64>,
    pub max_backlog_age_steps: u64,
}

impl Default for EquipmentConfig {
    fn default() -> Self {
        Self {
            initial_stocks: BTreeMap::new(),
            minimum_levels: BTreeMap::new(),
            max_backlog_age_steps: DEFAULT_BACKLOG_MAX_AGE_STEPS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRequestItem {
    pub requester: SectorId,
    pub equipment_type: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentSector {
    pub config: EquipmentConfig,
    pub stocks: Stocks,
    /// Quantities ordered from Earth that have not arrived yet.
    pub pending_orders: BTreeMap<String, f64>,
    pub backlog: Backlog<EquipmentRequestItem>,
    pub expired_this_step: u64,
}

impl EquipmentSector {
    pub fn new(config: EquipmentConfig) -> Self {
        let stocks = Stocks::with_initial(config.initial_stocks.clone());
        Self {
            config,
            stocks,
            pending_orders: BTreeMap::new(),
            backlog: Backlog::new(),
            expired_this_step: 0,
        }
    }

    pub fn power_demand(&self) -> f64 {
        // Warehouse overhead only.
        1.0
    }

    pub fn pending_for(&self, equipment_type: &str) -> f64 {
        self.pending_orders
            .get(equipment_type)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn handle_event(&mut self, event: &Event, ctx: &mut StepContext) -> Result<()> {
        match &event.payload {
            EventPayload::PayloadDelivered {
                destination,
                payload,
                ..
            } if *destination == Location::Moon => {
                for (item, amount) in payload {
                    // The flow credits physical stock at commit; the order
                    // stops being pending right away.
                    if *amount <= 0.0 {
                        continue;
                    }
                    let pending = self.pending_orders.entry(item.clone()).or_insert(0.0);
                    *pending = (*pending - amount).max(0.0);
                }
            }
            EventPayload::EquipmentRequest {
                requester,
                equipment_type,
                quantity,
            } => {
                if *quantity == 0 {
                    return Err(ProximaError::EventDelivery {
                        topic: event.topic.as_str(),
                        sector: SectorId::EquipmentManufacturing,
                        message: format!("zero-quantity equipment request: {equipment_type}"),
                    });
                }
                self.backlog.push(
                    EquipmentRequestItem {
                        requester: *requester,
                        equipment_type: equipment_type.clone(),
                        quantity: *quantity,
                    },
                    ctx.t,
                );
            }
            _ => {}
        }
        Ok(())
    }

    /// Credit delivered payloads into physical stock. Called by the
    /// orchestrator when routing `payload_delivered` events, so the flows
    /// land in the same step's commit.
    pub fn receive_payload(&self, payload: &BTreeMap<String, f64>, ctx: &mut StepContext) {
        for (item, amount) in payload {
            if *amount > 0.0 {
                ctx.ledger.record(StockFlow::produce(
                    SectorId::EquipmentManufacturing,
                    item,
                    *amount,
                ));
            }
        }
    }

    fn fulfill_backlog(&mut self, ctx: &mut StepContext) {
        let mut promised: BTreeMap<String, f64> = BTreeMap::new();
        let stocks = &self.stocks;
        let mut fulfilled: Vec<EquipmentRequestItem> = Vec::new();
        self.backlog.drain_fifo(|item| {
            let already = promised.get(&item.equipment_type).copied().unwrap_or(0.0);
            if stocks.get(&item.equipment_type) - already >= item.quantity as f64 {
                *promised.entry(item.equipment_type.clone()).or_insert(0.0) +=
                    item.quantity as f64;
                fulfilled.push(item.clone());
                true
            } else {
                false
            }
        });
        for item in fulfilled {
            ctx.ledger.record(StockFlow::transfer(
                SectorId::EquipmentManufacturing,
                item.requester,
                &item.equipment_type,
                item.quantity as f64,
            ));
            ctx.bus.publish(EventPayload::EquipmentAllocated {
                recipient: item.requester,
                equipment_type: item.equipment_type,
                quantity: item.quantity,
            });
        }
    }

    fn check_resupply(&mut self, ctx: &mut StepContext) {
        let mut order: BTreeMap<String, f64> = BTreeMap::new();
        for (item, minimum) in &self.config.minimum_levels {
            let effective = self.stocks.get(item) + self.pending_for(item);
            if effective < *minimum {
                order.insert(item.clone(), minimum - effective);
            }
        }
        if order.is_empty() {
            return;
        }
        for (item, amount) in &order {
            *self.pending_orders.entry(item.clone()).or_insert(0.0) += amount;
        }
        ctx.bus.publish(EventPayload::TransportRequest {
            requester: SectorId::EquipmentManufacturing,
            payload: order,
            origin: Location::Earth,
            destination: Location::Moon,
        });
    }

    pub fn step(&mut self, _power: f64, ctx: &mut StepContext) {
        self.expired_this_step = self
            .backlog
            .expire(ctx.t, self.config.max_backlog_age_steps) as u64;
        self.fulfill_backlog(ctx);
        self.check_resupply(ctx);
    }

    pub fn metrics(&self) -> SectorMetrics {
        let mut metrics = SectorMetrics::default();
        metrics.gauge("backlog_len", self.backlog.len() as f64);
        for (item, amount) in self.stocks.iter_sorted() {
            metrics.gauge(&format!("equipment_{item}"), amount);
        }
        for (item, amount) in &self.pending_orders {
            metrics.gauge(&format!("pending_{item}"), *amount);
        }
        metrics.contribute(METRIC_BACKLOG_EXPIRED, self.expired_this_step as f64);
        metrics
    }
}
