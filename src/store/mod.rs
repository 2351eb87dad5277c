//! Document store boundary
//!
//! The kernel consumes configuration documents and appends the simulation
//! log through this trait; a real deployment backs it with a document
//! database, tests and local runs use the JSON-directory and in-memory
//! implementations. Secrets of the storage engine never leak past here.

pub mod json_dir;
pub mod memory;

use serde::{Deserialize, Serialize};

use crate::core::error::Result;

pub use json_dir::JsonDirStore;
pub use memory::MemoryStore;

/// Control command deposited by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDoc {
    pub cmd_id: String,
    pub kind: CommandKind,
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Submission timestamp; commands apply FIFO by this.
    pub ts: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Pause,
    Resume,
    Stop,
    SetGoal,
    SetPolicy,
    InjectEvent,
    SetParam,
}

pub trait DocumentStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<serde_json::Value>>;

    fn list(&self, collection: &str) -> Result<Vec<serde_json::Value>>;

    /// Append one step record to the simulation log.
    fn append_log(&mut self, record: &serde_json::Value) -> Result<()>;

    /// Mirror the newest snapshot onto the world-system document so the
    /// dashboard can read state without scanning the log.
    fn update_latest_state(&mut self, ws_id: &str, state: &serde_json::Value) -> Result<()>;

    /// Remove and return all pending commands for an experiment.
    fn drain_commands(&mut self, experiment_id: &str) -> Result<Vec<CommandDoc>>;
}

/// Document id: `id` preferred, `_id` accepted.
pub fn doc_id(doc: &serde_json::Value) -> Option<&str> {
    doc.get("id")
        .or_else(|| doc.get("_id"))
        .and_then(|v| v.as_str())
}
