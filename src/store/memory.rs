//! In-memory document store for tests and embedded runs

use std::collections::BTreeMap;

use crate::core::error::{ProximaError, Result};
use crate::store::{doc_id, CommandDoc, DocumentStore};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: BTreeMap<String, Vec<serde_json::Value>>,
    pub logs: Vec<serde_json::Value>,
    pub latest_states: BTreeMap<String, serde_json::Value>,
    commands: Vec<CommandDoc>,
    /// Test hook: simulate an unreachable store for log writes.
    pub fail_log_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, collection: &str, doc: serde_json::Value) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(doc);
    }

    pub fn push_command(&mut self, command: CommandDoc) {
        self.commands.push(command);
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<serde_json::Value>> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| doc_id(d) == Some(id)))
            .cloned())
    }

    fn list(&self, collection: &str) -> Result<Vec<serde_json::Value>> {
        Ok(self.collections.get(collection).cloned().unwrap_or_default())
    }

    fn append_log(&mut self, record: &serde_json::Value) -> Result<()> {
        if self.fail_log_writes {
            return Err(ProximaError::StoreUnavailable(
                "memory store set to fail log writes".to_string(),
            ));
        }
        self.logs.push(record.clone());
        Ok(())
    }

    fn update_latest_state(&mut self, ws_id: &str, state: &serde_json::Value) -> Result<()> {
        if self.fail_log_writes {
            return Err(ProximaError::StoreUnavailable(
                "memory store set to fail log writes".to_string(),
            ));
        }
        self.latest_states.insert(ws_id.to_string(), state.clone());
        Ok(())
    }

    fn drain_commands(&mut self, experiment_id: &str) -> Result<Vec<CommandDoc>> {
        let (matching, rest): (Vec<CommandDoc>, Vec<CommandDoc>) = self
            .commands
            .drain(..)
            .partition(|c| match c.payload.get("experiment_id") {
                Some(id) => id.as_str() == Some(experiment_id),
                None => true,
            });
        self.commands = rest;
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CommandKind;

    #[test]
    fn test_get_by_id_or_underscore_id() {
        let mut store = MemoryStore::new();
        store.insert("goals", serde_json::json!({"id": "G-1", "weight": 1.0}));
        store.insert("goals", serde_json::json!({"_id": "G-2", "weight": 2.0}));

        assert!(store.get("goals", "G-1").unwrap().is_some());
        assert!(store.get("goals", "G-2").unwrap().is_some());
        assert!(store.get("goals", "G-3").unwrap().is_none());
    }

    #[test]
    fn test_commands_drain_once() {
        let mut store = MemoryStore::new();
        store.push_command(CommandDoc {
            cmd_id: "c1".to_string(),
            kind: CommandKind::Pause,
            payload: serde_json::Value::Null,
            ts: 5,
        });
        assert_eq!(store.drain_commands("exp_001").unwrap().len(), 1);
        assert!(store.drain_commands("exp_001").unwrap().is_empty());
    }
}
