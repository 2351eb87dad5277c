//! Narrowed world handle for policies
//!
//! Policies get this instead of the world itself: they can tune sector
//! knobs, publish events, and trigger repairs, but they cannot reach stocks
//! or queues. Metric state reaches them only through the evaluation result.

use crate::core::types::{SectorId, Step};
use crate::events::{EventBus, EventPayload};
use crate::sectors::{ManufacturingSector, ScienceSector};

pub struct WorldMutator<'a> {
    pub t: Step,
    bus: &'a mut EventBus,
    science: &'a mut ScienceSector,
    manufacturing: &'a mut ManufacturingSector,
}

impl<'a> WorldMutator<'a> {
    pub fn new(
        t: Step,
        bus: &'a mut EventBus,
        science: &'a mut ScienceSector,
        manufacturing: &'a mut ManufacturingSector,
    ) -> Self {
        Self {
            t,
            bus,
            science,
            manufacturing,
        }
    }

    /// Set a sector's throttle factor. Returns false for sectors that do
    /// not support throttling.
    pub fn set_throttle_factor(&mut self, sector: SectorId, factor: f64) -> bool {
        match sector {
            SectorId::Science => {
                self.science.set_throttle_factor(factor);
                true
            }
            SectorId::Manufacturing => {
                self.manufacturing.set_throttle_factor(factor);
                true
            }
            _ => false,
        }
    }

    /// Set a sector's target production rate. Returns false for sectors
    /// without a target knob.
    pub fn set_target_rate(&mut self, sector: SectorId, rate: f64) -> bool {
        match sector {
            SectorId::Science => {
                self.science.set_target_rate(rate);
                true
            }
            _ => false,
        }
    }

    /// Publish an event on the bus (visible next step).
    pub fn publish(&mut self, payload: EventPayload) {
        self.bus.publish(payload);
    }

    /// Shorthand for ordering module construction.
    pub fn request_build(&mut self, requester: SectorId, module_id: &str, quantity: u32) {
        self.publish(EventPayload::ConstructionRequest {
            requester,
            module_id: module_id.to_string(),
            shell_quantity: 1,
            quantity,
        });
    }

    /// Reset every faulted agent back to idle; returns how many.
    pub fn repair_faulted(&mut self) -> u32 {
        let mut repaired = 0;
        for rover in &mut self.science.rovers {
            if rover.lifecycle.state == crate::agents::AgentState::Fault {
                rover.lifecycle.repair();
                repaired += 1;
            }
        }
        for agent in &mut self.manufacturing.agents {
            if agent.lifecycle.state == crate::agents::AgentState::Fault {
                agent.lifecycle.repair();
                repaired += 1;
            }
        }
        repaired
    }
}
