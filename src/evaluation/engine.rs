//! Metric aggregation and goal scoring
//!
//! Per step: fold every sector's metric contributions into the performance
//! metrics (cumulative metrics integrate, the rest are recomputed), apply
//! environment dynamics, then score each active goal against its current
//! value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::constants::{
    METRIC_DUST_COVERAGE, SCORE_APPROACHING, SCORE_WITHIN,
};
use crate::core::types::{SectorId, Step};
use crate::evaluation::goals::{Goal, GoalDirection, GoalKind, GoalStatus};
use crate::evaluation::metrics::MetricDefinition;
use crate::sectors::SectorMetrics;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalScore {
    pub metric_id: String,
    pub value: f64,
    /// Point target the score was computed against (growth curves resolve
    /// to their value at the current month).
    pub target: f64,
    pub score: f64,
    pub status: GoalStatus,
    pub weight: f64,
}

/// Snapshot of one evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub t: Step,
    pub metrics: BTreeMap<String, f64>,
    pub scores: BTreeMap<String, GoalScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationEngine {
    pub metric_definitions: BTreeMap<String, MetricDefinition>,
    pub goals: Vec<Goal>,
    values: BTreeMap<String, f64>,
    /// Per-metric, per-sector contributions of the latest step; the
    /// orchestrator reads these to weight power allocation.
    last_contributions: BTreeMap<String, BTreeMap<SectorId, f64>>,
    pub dust_decay_per_step: f64,
    pub steps_per_month: u64,
}

impl EvaluationEngine {
    pub fn new(
        metric_definitions: Vec<MetricDefinition>,
        goals: Vec<Goal>,
        dust_decay_per_step: f64,
        steps_per_month: u64,
    ) -> Self {
        let values = metric_definitions
            .iter()
            .map(|m| (m.id.clone(), 0.0))
            .collect();
        Self {
            metric_definitions: metric_definitions
                .into_iter()
                .map(|m| (m.id.clone(), m))
                .collect(),
            goals,
            values,
            last_contributions: BTreeMap::new(),
            dust_decay_per_step,
            steps_per_month: steps_per_month.max(1),
        }
    }

    pub fn value(&self, metric_id: &str) -> f64 {
        self.values.get(metric_id).copied().unwrap_or(0.0)
    }

    pub fn set_value(&mut self, metric_id: &str, value: f64) {
        self.values.insert(metric_id.to_string(), value);
    }

    /// Share of `metric_id`'s latest contributions coming from each sector.
    pub fn contribution_shares(&self, metric_id: &str) -> BTreeMap<SectorId, f64> {
        let Some(by_sector) = self.last_contributions.get(metric_id) else {
            return BTreeMap::new();
        };
        let total: f64 = by_sector.values().map(|v| v.abs()).sum();
        if total <= 0.0 {
            return BTreeMap::new();
        }
        by_sector
            .iter()
            .map(|(sector, v)| (*sector, v.abs() / total))
            .collect()
    }

    fn months(&self, t: Step) -> f64 {
        t as f64 / self.steps_per_month as f64
    }

    fn apply_contributions(&mut self, sector_metrics: &BTreeMap<SectorId, SectorMetrics>) {
        let mut aggregated: BTreeMap<String, f64> = BTreeMap::new();
        let mut by_sector: BTreeMap<String, BTreeMap<SectorId, f64>> = BTreeMap::new();

        for (sector, metrics) in sector_metrics {
            for (metric_id, delta) in &metrics.contributions {
                *aggregated.entry(metric_id.clone()).or_insert(0.0) += delta;
                *by_sector
                    .entry(metric_id.clone())
                    .or_default()
                    .entry(*sector)
                    .or_insert(0.0) += delta;
            }
        }

        // Non-cumulative metrics reset each step, even with no contributors.
        let non_cumulative: Vec<String> = self
            .metric_definitions
            .values()
            .filter(|m| !m.cumulative)
            .map(|m| m.id.clone())
            .collect();
        for metric_id in non_cumulative {
            self.values.insert(metric_id, 0.0);
        }

        for (metric_id, delta) in aggregated {
            let cumulative = self
                .metric_definitions
                .get(&metric_id)
                .map(|m| m.cumulative)
                .unwrap_or(false);
            let entry = self.values.entry(metric_id).or_insert(0.0);
            if cumulative {
                *entry += delta;
            } else {
                *entry = delta;
            }
        }

        self.last_contributions = by_sector;
    }

    fn apply_environment_dynamics(&mut self) {
        if self.dust_decay_per_step > 0.0 {
            let current = self.value(METRIC_DUST_COVERAGE);
            self.set_value(
                METRIC_DUST_COVERAGE,
                (current - self.dust_decay_per_step).max(0.0),
            );
        }
    }

    fn score_goal(&self, goal: &Goal, t: Step) -> GoalScore {
        let value = self.value(&goal.metric_id);
        let months = self.months(t);
        let target = goal.target_at(months);

        let score = match &goal.kind {
            GoalKind::Target { target } => {
                let achieved = match goal.direction {
                    GoalDirection::Minimize => value <= *target,
                    GoalDirection::Maximize => value >= *target,
                };
                if achieved {
                    1.0
                } else {
                    let span = target.abs().max(f64::EPSILON);
                    1.0 - ((value - target).abs() / span).clamp(0.0, 1.0)
                }
            }
            GoalKind::Bounds { lo, hi } => {
                if value >= *lo && value <= *hi {
                    1.0
                } else {
                    let span = (hi - lo).abs().max(f64::EPSILON);
                    let distance = if value < *lo { lo - value } else { value - hi };
                    (1.0 - distance / span).clamp(0.0, 1.0)
                }
            }
            GoalKind::GrowthRate { .. } => {
                let curve = target.max(f64::EPSILON);
                match goal.direction {
                    GoalDirection::Maximize => (value / curve).clamp(0.0, 1.0),
                    GoalDirection::Minimize => {
                        if value <= curve {
                            1.0
                        } else {
                            (curve / value).clamp(0.0, 1.0)
                        }
                    }
                }
            }
        };

        let status = if score >= SCORE_WITHIN {
            GoalStatus::Within
        } else if score >= SCORE_APPROACHING {
            GoalStatus::Approaching
        } else {
            GoalStatus::Outside
        };

        GoalScore {
            metric_id: goal.metric_id.clone(),
            value,
            target,
            score,
            status,
            weight: goal.weight,
        }
    }

    /// Full evaluation pass for step `t`.
    pub fn evaluate(
        &mut self,
        sector_metrics: &BTreeMap<SectorId, SectorMetrics>,
        t: Step,
    ) -> EvaluationResult {
        self.apply_contributions(sector_metrics);
        self.apply_environment_dynamics();

        let scores = self
            .goals
            .iter()
            .filter(|goal| goal.active_at(t))
            .map(|goal| (goal.id.clone(), self.score_goal(goal, t)))
            .collect();

        EvaluationResult {
            t,
            metrics: self.values.clone(),
            scores,
        }
    }
}
