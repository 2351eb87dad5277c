//! Parametric performance goals

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalDirection {
    Maximize,
    Minimize,
}

/// The three goal shapes: a point target, an acceptance band, or a
/// compounding growth curve `base * factor^(month / period)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "goal_type", rename_all = "snake_case")]
pub enum GoalKind {
    Target {
        target: f64,
    },
    Bounds {
        lo: f64,
        hi: f64,
    },
    GrowthRate {
        base: f64,
        factor: f64,
        period_months: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Within,
    Approaching,
    Outside,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub name: String,
    pub metric_id: String,
    pub direction: GoalDirection,
    #[serde(flatten)]
    pub kind: GoalKind,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Evaluation horizon in steps; `None` means the goal never expires.
    #[serde(default)]
    pub horizon_steps: Option<u64>,
}

fn default_weight() -> f64 {
    1.0
}

impl Goal {
    /// The goal's current point target. For growth goals this is the curve
    /// evaluated at `months`; for bounds it is the near edge of the band.
    pub fn target_at(&self, months: f64) -> f64 {
        match &self.kind {
            GoalKind::Target { target } => *target,
            GoalKind::Bounds { lo, hi } => match self.direction {
                GoalDirection::Maximize => *lo,
                GoalDirection::Minimize => *hi,
            },
            GoalKind::GrowthRate {
                base,
                factor,
                period_months,
            } => base * factor.powf(months / period_months),
        }
    }

    pub fn active_at(&self, t: u64) -> bool {
        self.horizon_steps.map(|h| t < h).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_curve_doubles_per_period() {
        let goal = Goal {
            id: "G-SCI".to_string(),
            name: "Science doubling".to_string(),
            metric_id: "SCI-PROD-RATE".to_string(),
            direction: GoalDirection::Maximize,
            kind: GoalKind::GrowthRate {
                base: 100.0,
                factor: 2.0,
                period_months: 6.0,
            },
            weight: 1.0,
            horizon_steps: None,
        };
        assert!((goal.target_at(0.0) - 100.0).abs() < 1e-9);
        assert!((goal.target_at(6.0) - 200.0).abs() < 1e-9);
        assert!((goal.target_at(12.0) - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_horizon_expiry() {
        let goal = Goal {
            id: "G".to_string(),
            name: "g".to_string(),
            metric_id: "M".to_string(),
            direction: GoalDirection::Minimize,
            kind: GoalKind::Target { target: 1.0 },
            weight: 1.0,
            horizon_steps: Some(10),
        };
        assert!(goal.active_at(9));
        assert!(!goal.active_at(10));
    }
}
