//! Dust-coverage throttling policy
//!
//! Linear proactive throttle: nothing below `target * start_ratio`, the
//! full `theta_max` at or above the target, linear in between. Sectors are
//! throttled probabilistically, so a throttle of 0.4 pauses roughly 40% of
//! agent activations per step. When dust falls back into the safe band the
//! throttle resets to zero.

use serde::{Deserialize, Serialize};

use crate::core::constants::METRIC_DUST_COVERAGE;
use crate::core::types::SectorId;
use crate::evaluation::EvaluationResult;
use crate::world::WorldMutator;

pub const DUST_THROTTLE_POLICY_ID: &str = "PLCY-DUST-THROTTLE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DustThrottlePolicy {
    pub id: String,
    pub enabled: bool,
    pub metric_id: String,
    pub sectors: Vec<SectorId>,
    /// Maximum throttle applied at or beyond the dust target.
    pub theta_max: f64,
    /// Fraction of the target where throttling starts.
    pub start_ratio: f64,
}

impl Default for DustThrottlePolicy {
    fn default() -> Self {
        Self {
            id: DUST_THROTTLE_POLICY_ID.to_string(),
            enabled: true,
            metric_id: METRIC_DUST_COVERAGE.to_string(),
            sectors: vec![SectorId::Science, SectorId::Manufacturing],
            theta_max: 0.8,
            start_ratio: 0.7,
        }
    }
}

impl DustThrottlePolicy {
    /// Throttle for dust level `current` against `target`.
    pub fn throttle_for(&self, current: f64, target: f64) -> f64 {
        let start = target * self.start_ratio;
        if current <= start {
            return 0.0;
        }
        if current >= target {
            return self.theta_max;
        }
        let range = target - start;
        if range <= 0.0 {
            return self.theta_max;
        }
        self.theta_max * (current - start) / range
    }

    pub fn apply(
        &mut self,
        world: &mut WorldMutator,
        evaluation: &EvaluationResult,
    ) -> serde_json::Value {
        let Some(score) = evaluation
            .scores
            .values()
            .find(|s| s.metric_id == self.metric_id)
        else {
            return serde_json::json!({
                "error": format!("no goal for metric {}", self.metric_id),
            });
        };

        let throttle = self.throttle_for(score.value, score.target);
        let mut applied_to = Vec::new();
        for sector in &self.sectors {
            if world.set_throttle_factor(*sector, throttle) {
                applied_to.push(sector.as_str());
            }
        }

        serde_json::json!({
            "metric_id": self.metric_id,
            "dust": score.value,
            "target": score.target,
            "score": score.score,
            "throttle": throttle,
            "applied_to": applied_to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> DustThrottlePolicy {
        DustThrottlePolicy::default()
    }

    #[test]
    fn test_safe_band_no_throttle() {
        // Start level is 0.7 for a target of 1.0.
        assert_eq!(policy().throttle_for(0.5, 1.0), 0.0);
        assert_eq!(policy().throttle_for(0.7, 1.0), 0.0);
    }

    #[test]
    fn test_at_target_max_throttle() {
        assert_eq!(policy().throttle_for(1.0, 1.0), 0.8);
        assert_eq!(policy().throttle_for(2.0, 1.0), 0.8);
    }

    #[test]
    fn test_linear_ramp() {
        // 0.8 * (0.85 - 0.7) / (1.0 - 0.7) = 0.4
        let throttle = policy().throttle_for(0.85, 1.0);
        assert!((throttle - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_idempotent_on_stable_metric() {
        let policy = policy();
        let first = policy.throttle_for(0.85, 1.0);
        let second = policy.throttle_for(0.85, 1.0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_recovery_resets_to_zero() {
        let policy = policy();
        assert!(policy.throttle_for(0.9, 1.0) > 0.0);
        assert_eq!(policy.throttle_for(0.6, 1.0), 0.0);
    }

    #[test]
    fn test_degenerate_start_ratio_one() {
        let mut policy = policy();
        policy.start_ratio = 1.0;
        assert_eq!(policy.throttle_for(0.99, 1.0), 0.0);
        assert_eq!(policy.throttle_for(1.0, 1.0), 0.8);
    }
}
