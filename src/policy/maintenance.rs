//! Fleet maintenance policy
//!
//! Faulted agents stay out of service until a maintenance window comes
//! around; the window interval bounds how long a fault outage can last.

use serde::{Deserialize, Serialize};

use crate::evaluation::EvaluationResult;
use crate::world::WorldMutator;

pub const MAINTENANCE_POLICY_ID: &str = "PLCY-MAINTENANCE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenancePolicy {
    pub id: String,
    pub enabled: bool,
    /// Steps between maintenance windows.
    pub interval_steps: u64,
    pub repairs_total: u64,
}

impl Default for MaintenancePolicy {
    fn default() -> Self {
        Self {
            id: MAINTENANCE_POLICY_ID.to_string(),
            enabled: true,
            interval_steps: 24,
            repairs_total: 0,
        }
    }
}

impl MaintenancePolicy {
    pub fn apply(
        &mut self,
        world: &mut WorldMutator,
        evaluation: &EvaluationResult,
    ) -> serde_json::Value {
        let interval = self.interval_steps.max(1);
        if evaluation.t % interval != 0 {
            return serde_json::json!({ "window": false });
        }
        let repaired = world.repair_faulted();
        self.repairs_total += repaired as u64;
        serde_json::json!({
            "window": true,
            "repaired": repaired,
            "repairs_total": self.repairs_total,
        })
    }
}
