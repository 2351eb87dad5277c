//! Shared agent lifecycle state

use serde::{Deserialize, Serialize};

use crate::core::types::AgentId;

/// Top-level agent state. `Active` sub-modes live in the agent types
/// themselves (ISRU modes, rocket mission phases, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Idle,
    Active,
    Throttled,
    Fault,
    Retired,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentHealth {
    pub age_steps: u64,
    pub wear: f64,
    pub fault_counter: u32,
}

/// Id, state, and health bookkeeping shared by every agent type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lifecycle {
    pub id: AgentId,
    pub state: AgentState,
    pub health: AgentHealth,
    /// End-of-life age; `None` means the agent never wears out.
    pub lifetime_steps: Option<u64>,
}

impl Lifecycle {
    pub fn new(lifetime_steps: Option<u64>) -> Self {
        Self {
            id: AgentId::new(),
            state: AgentState::Idle,
            health: AgentHealth::default(),
            lifetime_steps,
        }
    }

    /// Per-step aging. Returns false when the agent must be skipped this
    /// step (faulted or retired). Retirement happens here and is permanent.
    pub fn begin_step(&mut self) -> bool {
        if self.state == AgentState::Retired {
            return false;
        }
        self.health.age_steps += 1;
        if let Some(lifetime) = self.lifetime_steps {
            if self.health.age_steps >= lifetime {
                self.state = AgentState::Retired;
                return false;
            }
        }
        if self.state == AgentState::Fault {
            return false;
        }
        // A throttle skip lasts exactly one step.
        if self.state == AgentState::Throttled {
            self.state = AgentState::Idle;
        }
        true
    }

    pub fn fault(&mut self) {
        if self.state != AgentState::Retired {
            self.state = AgentState::Fault;
            self.health.fault_counter += 1;
        }
    }

    /// Maintenance reset; only faulted agents go back to idle.
    pub fn repair(&mut self) {
        if self.state == AgentState::Fault {
            self.state = AgentState::Idle;
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == AgentState::Idle
    }

    pub fn is_retired(&self) -> bool {
        self.state == AgentState::Retired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retires_at_end_of_life() {
        let mut lc = Lifecycle::new(Some(3));
        assert!(lc.begin_step());
        assert!(lc.begin_step());
        assert!(!lc.begin_step());
        assert!(lc.is_retired());
        // Retired agents stay retired and stop aging.
        assert!(!lc.begin_step());
        assert_eq!(lc.health.age_steps, 3);
    }

    #[test]
    fn test_fault_and_repair() {
        let mut lc = Lifecycle::new(None);
        lc.fault();
        assert_eq!(lc.state, AgentState::Fault);
        assert_eq!(lc.health.fault_counter, 1);
        assert!(!lc.begin_step());

        lc.repair();
        assert!(lc.is_idle());
        assert!(lc.begin_step());
    }

    #[test]
    fn test_repair_does_not_resurrect_retired() {
        let mut lc = Lifecycle::new(Some(1));
        lc.begin_step();
        assert!(lc.is_retired());
        lc.repair();
        assert!(lc.is_retired());
    }
}
