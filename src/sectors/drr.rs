//! Priority-as-token deficit round robin
//!
//! The manufacturing scheduler picks one ISRU task per step. Each task has a
//! token bank; every step each available task banks its normalized priority
//! share, the fullest bank wins the turn, and the winner pays one token when
//! work actually happens. Priorities enter the banks normalized to sum to
//! one, so the per-step top-up across tasks balances the one-token spend per
//! turn and long-run turn shares converge to `p_i / sum(p_j)`.
//!
//! A task that is unavailable or has zero priority forfeits its bank, so a
//! task cannot hoard turns for later from behind a stockout.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agents::isru::IsruMode;

const BANK_EPSILON: f64 = 1e-9;

/// Default token cost of one executed turn.
pub const DEFAULT_TAU: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrrScheduler {
    /// Task ordering; the rotating pointer indexes into this.
    tasks: Vec<IsruMode>,
    banks: BTreeMap<IsruMode, f64>,
    /// Tie-break pointer; advanced past each winner.
    rotate: usize,
    tau: f64,
    /// Executed turns per task, for fairness diagnostics.
    pub turns: BTreeMap<IsruMode, u64>,
}

impl DrrScheduler {
    pub fn new(tasks: Vec<IsruMode>) -> Self {
        Self {
            tasks,
            banks: BTreeMap::new(),
            rotate: 0,
            tau: DEFAULT_TAU,
            turns: BTreeMap::new(),
        }
    }

    /// One scheduling round: top up banks, then pick the winner.
    ///
    /// `priorities` holds `p_i >= 0` per task; `available` marks tasks whose
    /// agents, inputs, and power budget are all in place. Returns the task
    /// to execute this step, if any.
    pub fn select(
        &mut self,
        priorities: &BTreeMap<IsruMode, f64>,
        available: &BTreeMap<IsruMode, bool>,
    ) -> Option<IsruMode> {
        let is_live = |task: &IsruMode| {
            available.get(task).copied().unwrap_or(false)
                && priorities.get(task).copied().unwrap_or(0.0) > 0.0
        };

        let total_priority: f64 = self
            .tasks
            .iter()
            .filter(|task| is_live(task))
            .map(|task| priorities[task])
            .sum();

        // Top-up: live tasks bank their normalized share, the rest reset.
        for task in &self.tasks {
            let bank = self.banks.entry(*task).or_insert(0.0);
            if is_live(task) && total_priority > 0.0 {
                *bank += priorities[task] / total_priority;
            } else {
                *bank = 0.0;
            }
        }

        // Select: fullest bank among live tasks; ties go to the first
        // candidate at or after the rotating pointer.
        let best_bank = self
            .tasks
            .iter()
            .filter(|task| is_live(task))
            .map(|task| self.banks[task])
            .fold(f64::NEG_INFINITY, f64::max);
        if best_bank <= BANK_EPSILON {
            return None;
        }

        let n = self.tasks.len();
        let winner_index = (0..n)
            .map(|offset| (self.rotate + offset) % n)
            .find(|&i| {
                let task = self.tasks[i];
                is_live(&task) && (self.banks[&task] - best_bank).abs() <= BANK_EPSILON
            })?;

        self.rotate = (winner_index + 1) % n;
        Some(self.tasks[winner_index])
    }

    /// Charge the winner for the turn. `did_work` is whether an agent was
    /// actually dispatched; a dry turn costs nothing.
    pub fn spend(&mut self, winner: IsruMode, did_work: bool) {
        if did_work {
            let bank = self.banks.entry(winner).or_insert(0.0);
            *bank = (*bank - self.tau).max(0.0);
            *self.turns.entry(winner).or_insert(0) += 1;
        }
    }
}
