//! Simulation log snapshots
//!
//! Every step produces a [`StepRecord`]; the [`SnapshotLogger`] writes it to
//! the store's time-series collection and buffers a flattened row for a CSV
//! file, at a configurable skip-step cadence. Store failures never block the
//! simulation: writes back off exponentially and the number of dropped
//! snapshots is surfaced as the `LOG-DROPPED` metric.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::constants::STORE_BACKOFF_MAX_STEPS;
use crate::core::types::Step;
use crate::store::DocumentStore;
use crate::world::StepReport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerState {
    pub is_running: bool,
    pub is_paused: bool,
    pub log_dropped_total: u64,
}

/// One step's log record, as written to the store and flattened for CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub experiment_id: String,
    pub t: Step,
    pub sectors: BTreeMap<String, BTreeMap<String, f64>>,
    pub evaluation: serde_json::Value,
    pub policy_effects: BTreeMap<String, serde_json::Value>,
    pub runner_state: RunnerState,
    pub errors: Vec<String>,
}

impl StepRecord {
    pub fn from_report(
        experiment_id: &str,
        report: &StepReport,
        runner_state: RunnerState,
    ) -> Self {
        let sectors = report
            .sector_metrics
            .iter()
            .map(|(id, metrics)| (id.to_string(), metrics.gauges.clone()))
            .collect();
        Self {
            experiment_id: experiment_id.to_string(),
            t: report.t,
            sectors,
            evaluation: serde_json::to_value(&report.evaluation)
                .unwrap_or(serde_json::Value::Null),
            policy_effects: report.policy_effects.clone(),
            runner_state,
            errors: report.errors.clone(),
        }
    }

    /// Flatten for CSV: sector gauges become `<sector>_<key>` columns and
    /// evaluation metrics become `metric_<id>` columns.
    pub fn to_flat_row(&self) -> BTreeMap<String, String> {
        let mut row = BTreeMap::new();
        row.insert("experiment_id".to_string(), self.experiment_id.clone());
        row.insert("step".to_string(), self.t.to_string());
        for (sector, gauges) in &self.sectors {
            for (key, value) in gauges {
                row.insert(format!("{sector}_{key}"), value.to_string());
            }
        }
        if let Some(metrics) = self.evaluation.get("metrics").and_then(|m| m.as_object()) {
            for (metric_id, value) in metrics {
                row.insert(format!("metric_{metric_id}"), value.to_string());
            }
        }
        row.insert("errors".to_string(), self.errors.join("; "));
        row
    }
}

#[derive(Debug)]
pub struct SnapshotLogger {
    ws_id: String,
    /// Write every Nth step.
    skip_steps: u64,
    /// Suppresses all store writes (`--read-only`).
    read_only: bool,
    csv_path: Option<PathBuf>,
    csv_rows: Vec<BTreeMap<String, String>>,
    /// Store writes resume at this step after a failure.
    retry_at: Step,
    failure_streak: u32,
    pub dropped_total: u64,
}

impl SnapshotLogger {
    pub fn new(
        ws_id: &str,
        skip_steps: u64,
        read_only: bool,
        csv_path: Option<PathBuf>,
    ) -> Self {
        Self {
            ws_id: ws_id.to_string(),
            skip_steps: skip_steps.max(1),
            read_only,
            csv_path,
            csv_rows: Vec::new(),
            retry_at: 0,
            failure_streak: 0,
            dropped_total: 0,
        }
    }

    /// Log one step. Never fails; store trouble is absorbed into backoff.
    pub fn log(&mut self, record: &StepRecord, store: &mut dyn DocumentStore) {
        if record.t % self.skip_steps != 0 {
            return;
        }
        if self.csv_path.is_some() {
            self.csv_rows.push(record.to_flat_row());
        }
        if self.read_only {
            return;
        }
        if record.t < self.retry_at {
            self.dropped_total += 1;
            return;
        }

        let value = match serde_json::to_value(record) {
            Ok(value) => value,
            Err(_) => {
                self.dropped_total += 1;
                return;
            }
        };
        let latest_state = serde_json::json!({
            "step": record.t,
            "runner_state": record.runner_state,
            "sectors": record.sectors,
        });
        let write = store
            .append_log(&value)
            .and_then(|_| store.update_latest_state(&self.ws_id, &latest_state));
        match write {
            Ok(()) => {
                self.failure_streak = 0;
            }
            Err(_) => {
                self.dropped_total += 1;
                self.failure_streak += 1;
                let backoff =
                    (1u64 << self.failure_streak.min(16)).min(STORE_BACKOFF_MAX_STEPS);
                self.retry_at = record.t + backoff;
            }
        }
    }

    /// Write the buffered CSV rows. Columns are the union of all row keys,
    /// sorted; missing cells are left empty.
    pub fn save_csv(&self) -> std::io::Result<()> {
        let Some(path) = &self.csv_path else {
            return Ok(());
        };
        if self.csv_rows.is_empty() {
            return Ok(());
        }

        let mut columns: Vec<String> = self
            .csv_rows
            .iter()
            .flat_map(|row| row.keys().cloned())
            .collect();
        columns.sort();
        columns.dedup();

        let mut out = String::new();
        out.push_str(&columns.join(","));
        out.push('\n');
        for row in &self.csv_rows {
            let cells: Vec<String> = columns
                .iter()
                .map(|c| row.get(c).cloned().unwrap_or_default())
                .collect();
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        fs::write(path, out)
    }
}
