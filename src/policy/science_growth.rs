//! Science growth (doubling) policy
//!
//! A feed-forward fleet controller. On every month tick it projects the
//! science target `lead` months out on the doubling curve, converts that to
//! a required rover count, subtracts the forecast fleet (active rovers minus
//! expected losses plus everything already ordered and due in time), and
//! orders the shortfall with a safety margin. The pipeline list is what
//! keeps the controller from double-ordering: an order stays in it from the
//! step it is placed until its arrival is observed.

use serde::{Deserialize, Serialize};

use crate::core::constants::{METRIC_ROVER_COUNT, METRIC_SCIENCE_RATE};
use crate::core::types::SectorId;
use crate::evaluation::EvaluationResult;
use crate::events::{Event, EventPayload};
use crate::policy::{is_month_tick, month_of};
use crate::sectors::science::SCIENCE_ROVER_MODULE;
use crate::world::WorldMutator;

pub const SCIENCE_GROWTH_POLICY_ID: &str = "PLCY-GROWTH-SCIENCE-RATE";

/// An in-flight construction order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineOrder {
    pub arrival_month: u64,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScienceGrowthPolicy {
    pub id: String,
    pub enabled: bool,
    /// Base science rate at month zero.
    pub base_rate: f64,
    pub growth_factor: f64,
    pub period_months: f64,
    /// Orders placed now arrive this many months out.
    pub lead_months: u64,
    /// Safety margin on the required fleet.
    pub beta: f64,
    /// Effective science output per rover per step.
    pub rover_productivity: f64,
    pub expected_losses: u32,
    pub module_id: String,
    pub steps_per_month: u64,
    pub pipeline: Vec<PipelineOrder>,
}

impl Default for ScienceGrowthPolicy {
    fn default() -> Self {
        Self {
            id: SCIENCE_GROWTH_POLICY_ID.to_string(),
            enabled: true,
            base_rate: 100.0,
            growth_factor: 2.0,
            period_months: 6.0,
            lead_months: 1,
            beta: 0.1,
            rover_productivity: 10.0,
            expected_losses: 0,
            module_id: SCIENCE_ROVER_MODULE.to_string(),
            steps_per_month: 720,
            pipeline: Vec::new(),
        }
    }
}

impl ScienceGrowthPolicy {
    /// Science target on the doubling curve at `month`.
    pub fn target_at_month(&self, month: f64) -> f64 {
        self.base_rate * self.growth_factor.powf(month / self.period_months)
    }

    /// Remove arrived orders from the pipeline, oldest first.
    pub fn observe(&mut self, events: &[Event]) {
        for event in events {
            if let EventPayload::ModuleCompleted {
                module_id,
                quantity,
                ..
            } = &event.payload
            {
                if module_id == &self.module_id {
                    self.retire_pipeline(*quantity);
                }
            }
        }
    }

    fn retire_pipeline(&mut self, mut arrived: u32) {
        self.pipeline.sort_by_key(|order| order.arrival_month);
        for order in &mut self.pipeline {
            if arrived == 0 {
                break;
            }
            let taken = order.quantity.min(arrived);
            order.quantity -= taken;
            arrived -= taken;
        }
        self.pipeline.retain(|order| order.quantity > 0);
    }

    /// Shortfall to order at month `m`, given the active fleet size.
    pub fn order_quantity(&self, month: u64, active_rovers: f64) -> u32 {
        let horizon = (month + self.lead_months) as f64;
        let science_target = self.target_at_month(horizon);
        let required = (science_target / self.rover_productivity).ceil();

        let in_flight: u32 = self
            .pipeline
            .iter()
            .filter(|order| order.arrival_month <= month + self.lead_months)
            .map(|order| order.quantity)
            .sum();
        let forecast =
            active_rovers - self.expected_losses as f64 + in_flight as f64;

        // Tolerance before the ceil keeps binary round-off in the margin
        // product (e.g. 1.1 * 20) from ordering a phantom rover.
        let padded = (1.0 + self.beta) * required;
        let needed = (padded - 1e-9).ceil() - forecast;
        if needed > 0.0 {
            needed as u32
        } else {
            0
        }
    }

    pub fn apply(
        &mut self,
        world: &mut WorldMutator,
        evaluation: &EvaluationResult,
    ) -> serde_json::Value {
        if !is_month_tick(evaluation.t, self.steps_per_month) {
            return serde_json::json!({ "tick": false });
        }
        let month = month_of(evaluation.t, self.steps_per_month);
        let active_rovers = evaluation
            .metrics
            .get(METRIC_ROVER_COUNT)
            .copied()
            .unwrap_or(0.0);

        let quantity = self.order_quantity(month, active_rovers);
        if quantity > 0 {
            world.publish(EventPayload::ConstructionRequest {
                requester: SectorId::Science,
                module_id: self.module_id.clone(),
                shell_quantity: 1,
                quantity,
            });
            self.pipeline.push(PipelineOrder {
                arrival_month: month + self.lead_months,
                quantity,
            });
        }

        serde_json::json!({
            "tick": true,
            "month": month,
            "science_rate": evaluation
                .metrics
                .get(METRIC_SCIENCE_RATE)
                .copied()
                .unwrap_or(0.0),
            "active_rovers": active_rovers,
            "ordered": quantity,
            "pipeline_total": self.pipeline.iter().map(|o| o.quantity).sum::<u32>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ScienceGrowthPolicy {
        // The literal controller scenario: S0=100, p_eff=10, L=1, beta=0.1.
        ScienceGrowthPolicy {
            steps_per_month: 1,
            ..ScienceGrowthPolicy::default()
        }
    }

    #[test]
    fn test_doubling_curve() {
        let policy = policy();
        assert!((policy.target_at_month(0.0) - 100.0).abs() < 1e-9);
        assert!((policy.target_at_month(6.0) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_order_quantity_literal_case() {
        // At month 5 with 10 active rovers, 1 expected loss, and (6, 5)
        // already in flight: target(6)=200, required=20, forecast=14,
        // order = ceil(1.1*20) - 14 = 8.
        let mut policy = policy();
        policy.expected_losses = 1;
        policy.pipeline.push(PipelineOrder {
            arrival_month: 6,
            quantity: 5,
        });

        assert_eq!(policy.order_quantity(5, 10.0), 8);
    }

    #[test]
    fn test_orders_outside_lead_window_ignored() {
        let mut policy = policy();
        policy.pipeline.push(PipelineOrder {
            arrival_month: 9,
            quantity: 50,
        });
        // target(1) = 100 * 2^(1/6) ≈ 112.25 → required 12, forecast 10.
        assert_eq!(policy.order_quantity(0, 10.0), 4);
    }

    #[test]
    fn test_no_order_when_fleet_sufficient() {
        let policy = policy();
        assert_eq!(policy.order_quantity(0, 100.0), 0);
    }

    #[test]
    fn test_observe_retires_oldest_orders_first() {
        let mut policy = policy();
        policy.pipeline = vec![
            PipelineOrder {
                arrival_month: 7,
                quantity: 3,
            },
            PipelineOrder {
                arrival_month: 6,
                quantity: 2,
            },
        ];

        let event = Event::new(EventPayload::ModuleCompleted {
            recipient: SectorId::Science,
            module_id: SCIENCE_ROVER_MODULE.to_string(),
            quantity: 4,
        });
        policy.observe(&[event]);

        assert_eq!(policy.pipeline.len(), 1);
        assert_eq!(policy.pipeline[0].arrival_month, 7);
        assert_eq!(policy.pipeline[0].quantity, 1);
    }

    #[test]
    fn test_other_modules_do_not_touch_pipeline() {
        let mut policy = policy();
        policy.pipeline.push(PipelineOrder {
            arrival_month: 6,
            quantity: 2,
        });
        let event = Event::new(EventPayload::ModuleCompleted {
            recipient: SectorId::Transportation,
            module_id: "comp_rocket".to_string(),
            quantity: 1,
        });
        policy.observe(&[event]);
        assert_eq!(policy.pipeline[0].quantity, 2);
    }
}
