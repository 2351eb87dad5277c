//! Simulation runner - drives the step loop and external control surface
//!
//! The runner owns the world between steps: it drains dashboard commands
//! (FIFO by timestamp), applies them, executes the step, and hands the
//! snapshot to the log sinks. Pause stops the loop between steps; nothing
//! interrupts a step in flight.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::core::constants::METRIC_LOG_DROPPED;
use crate::core::error::{ProximaError, Result};
use crate::evaluation::Goal;
use crate::ledger::CommitMode;
use crate::logsink::{RunnerState, SnapshotLogger, StepRecord};
use crate::policy::Policy;
use crate::core::types::SectorId;
use crate::store::{CommandDoc, CommandKind, DocumentStore};
use crate::world::World;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub max_steps: Option<u64>,
    /// Wall-clock delay between steps, for live dashboard runs.
    pub step_delay_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_steps: None,
            step_delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub steps_run: u64,
    pub stopped_by_command: bool,
    pub log_dropped_total: u64,
}

pub struct Runner {
    pub world: World,
    pub logger: SnapshotLogger,
    config: RunnerConfig,
    is_running: bool,
    is_paused: bool,
}

impl Runner {
    pub fn new(world: World, logger: SnapshotLogger, config: RunnerConfig) -> Self {
        Self {
            world,
            logger,
            config,
            is_running: false,
            is_paused: false,
        }
    }

    /// Run until the step cap, a stop command, or a fatal error.
    pub fn run(&mut self, store: &mut dyn DocumentStore) -> Result<RunSummary> {
        self.is_running = true;
        self.is_paused = false;
        let mut steps_run = 0u64;
        let mut stopped_by_command = false;

        while self.is_running {
            if let Some(max) = self.config.max_steps {
                if self.world.t >= max {
                    break;
                }
            }

            self.process_commands(store);
            if !self.is_running {
                stopped_by_command = true;
                break;
            }
            if self.is_paused {
                std::thread::sleep(std::time::Duration::from_millis(
                    self.config.step_delay_ms.max(10),
                ));
                continue;
            }

            let report = self.world.step()?;
            let record = StepRecord::from_report(
                &self.world.experiment_id,
                &report,
                RunnerState {
                    is_running: self.is_running,
                    is_paused: self.is_paused,
                    log_dropped_total: self.logger.dropped_total,
                },
            );
            self.logger.log(&record, store);
            // Dropped snapshots surface as a metric in the next evaluation.
            self.world
                .evaluation
                .set_value(METRIC_LOG_DROPPED, self.logger.dropped_total as f64);

            steps_run += 1;
            if self.config.step_delay_ms > 0 {
                std::thread::sleep(std::time::Duration::from_millis(self.config.step_delay_ms));
            }
        }

        self.is_running = false;
        if let Err(error) = self.logger.save_csv() {
            eprintln!("could not save CSV log: {error}");
        }
        Ok(RunSummary {
            steps_run,
            stopped_by_command,
            log_dropped_total: self.logger.dropped_total,
        })
    }

    fn process_commands(&mut self, store: &mut dyn DocumentStore) {
        let mut commands = match store.drain_commands(&self.world.experiment_id) {
            Ok(commands) => commands,
            Err(_) => return,
        };
        commands.sort_by_key(|c| c.ts);
        for command in commands {
            if let Err(error) = self.apply_command(&command) {
                eprintln!("command {} failed: {error}", command.cmd_id);
            }
        }
    }

    fn apply_command(&mut self, command: &CommandDoc) -> Result<()> {
        match command.kind {
            CommandKind::Pause => self.is_paused = true,
            CommandKind::Resume => self.is_paused = false,
            CommandKind::Stop => self.is_running = false,
            CommandKind::SetGoal => {
                let goal: Goal = serde_json::from_value(command.payload.clone())?;
                let goals = &mut self.world.evaluation.goals;
                if let Some(existing) = goals.iter_mut().find(|g| g.id == goal.id) {
                    *existing = goal;
                } else {
                    goals.push(goal);
                }
            }
            CommandKind::SetPolicy => self.apply_set_policy(&command.payload)?,
            CommandKind::InjectEvent => {
                let payload = serde_json::from_value(
                    command
                        .payload
                        .get("event")
                        .cloned()
                        .unwrap_or(Value::Null),
                )?;
                self.world.bus.publish(payload);
            }
            CommandKind::SetParam => self.apply_set_param(&command.payload)?,
        }
        Ok(())
    }

    /// `{"id": ..., "enabled": bool}` toggles; `{"policy": {...}}` upserts.
    fn apply_set_policy(&mut self, payload: &Value) -> Result<()> {
        if let Some(policy_value) = payload.get("policy") {
            let policy: Policy = serde_json::from_value(policy_value.clone())?;
            self.world.policy.remove_policy(policy.id());
            self.world.policy.add_policy(policy);
            return Ok(());
        }
        let id = payload
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProximaError::Config("set_policy payload missing id".to_string()))?;
        let enabled = payload
            .get("enabled")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        if !self.world.policy.enable_policy(id, enabled) {
            return Err(ProximaError::Config(format!("unknown policy {id}")));
        }
        Ok(())
    }

    /// `{"param": "<name>", "value": <number>}` for the small set of
    /// runtime-tunable knobs.
    fn apply_set_param(&mut self, payload: &Value) -> Result<()> {
        let param = payload
            .get("param")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProximaError::Config("set_param payload missing param".to_string()))?;
        let value = payload
            .get("value")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| ProximaError::Config("set_param payload missing value".to_string()))?;

        match param {
            "science.throttle_factor" => self.world.science.set_throttle_factor(value),
            "manufacturing.throttle_factor" => {
                self.world.manufacturing.set_throttle_factor(value)
            }
            "science.target_rate" => self.world.science.set_target_rate(value),
            "dust_decay_per_step" => self.world.evaluation.dust_decay_per_step = value.max(0.0),
            "commit_mode.lenient" => {
                self.world.commit_mode = if value != 0.0 {
                    CommitMode::Lenient
                } else {
                    CommitMode::Strict
                };
            }
            other => {
                return Err(ProximaError::Config(format!("unknown param {other}")));
            }
        }
        Ok(())
    }

    /// Per-sector gauge map of the latest step, for status displays.
    pub fn latest_gauges(&self) -> BTreeMap<SectorId, BTreeMap<String, f64>> {
        self.world
            .last_sector_metrics
            .iter()
            .map(|(id, m)| (*id, m.gauges.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sectors::{
        ConstructionSector, EnergySector, EquipmentSector, ManufacturingSector, ScienceSector,
        TransportationSector,
    };
    use crate::evaluation::EvaluationEngine;
    use crate::policy::PolicyEngine;
    use crate::store::MemoryStore;
    use crate::world::WorldConfig;

    fn bare_world() -> World {
        World::new(
            WorldConfig {
                experiment_id: "exp_001".to_string(),
                steps_per_month: 720,
                commit_mode: crate::ledger::CommitMode::Strict,
                scheduled_events: Vec::new(),
                energy: EnergySector::new(Default::default(), Vec::new(), Vec::new()),
                science: ScienceSector::new(Default::default(), Vec::new()),
                manufacturing: ManufacturingSector::new(Default::default(), Vec::new()),
                equipment: EquipmentSector::new(Default::default()),
                transportation: TransportationSector::new(
                    Default::default(),
                    Vec::new(),
                    Vec::new(),
                ),
                construction: ConstructionSector::new(Default::default(), Vec::new(), Vec::new()),
                evaluation: EvaluationEngine::new(Vec::new(), Vec::new(), 0.0, 720),
                policy: PolicyEngine::default(),
            },
            42,
        )
    }

    fn runner(max_steps: u64) -> Runner {
        Runner::new(
            bare_world(),
            SnapshotLogger::new("ws_beta_1", 1, false, None),
            RunnerConfig {
                max_steps: Some(max_steps),
                step_delay_ms: 0,
            },
        )
    }

    #[test]
    fn test_runs_to_step_cap() {
        let mut store = MemoryStore::new();
        let summary = runner(5).run(&mut store).unwrap();
        assert_eq!(summary.steps_run, 5);
        assert_eq!(store.logs.len(), 5);
    }

    #[test]
    fn test_stop_command_halts_run() {
        let mut store = MemoryStore::new();
        store.push_command(CommandDoc {
            cmd_id: "c1".to_string(),
            kind: CommandKind::Stop,
            payload: Value::Null,
            ts: 1,
        });
        let summary = runner(100).run(&mut store).unwrap();
        assert_eq!(summary.steps_run, 0);
        assert!(summary.stopped_by_command);
    }

    #[test]
    fn test_set_param_command() {
        let mut runner = runner(1);
        let mut store = MemoryStore::new();
        store.push_command(CommandDoc {
            cmd_id: "c1".to_string(),
            kind: CommandKind::SetParam,
            payload: serde_json::json!({"param": "science.throttle_factor", "value": 0.3}),
            ts: 1,
        });
        runner.run(&mut store).unwrap();
        assert!((runner.world.science.throttle_factor - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_set_goal_upserts() {
        let mut runner = runner(1);
        let mut store = MemoryStore::new();
        store.push_command(CommandDoc {
            cmd_id: "c1".to_string(),
            kind: CommandKind::SetGoal,
            payload: serde_json::json!({
                "id": "WS-PG-004",
                "name": "Dust cap",
                "metric_id": "IND-DUST-COV",
                "direction": "minimize",
                "goal_type": "target",
                "target": 1.0,
            }),
            ts: 1,
        });
        runner.run(&mut store).unwrap();
        assert_eq!(runner.world.evaluation.goals.len(), 1);
    }

    #[test]
    fn test_commands_apply_fifo_by_ts() {
        let mut runner = runner(1);
        let mut store = MemoryStore::new();
        // Deposited out of order; the later ts must win.
        store.push_command(CommandDoc {
            cmd_id: "c2".to_string(),
            kind: CommandKind::SetParam,
            payload: serde_json::json!({"param": "science.target_rate", "value": 9.0}),
            ts: 20,
        });
        store.push_command(CommandDoc {
            cmd_id: "c1".to_string(),
            kind: CommandKind::SetParam,
            payload: serde_json::json!({"param": "science.target_rate", "value": 4.0}),
            ts: 10,
        });
        runner.run(&mut store).unwrap();
        assert!((runner.world.science.target_rate - 9.0).abs() < 1e-9);
    }
}
