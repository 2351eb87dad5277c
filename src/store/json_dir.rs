//! JSON-directory document store
//!
//! Each collection is `<root>/<collection>.json`, a JSON array of documents
//! with string ids. The simulation log appends to
//! `<root>/logs_simulation.jsonl`, one record per line. Commands are drained
//! destructively from `<root>/commands.json`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::error::{ProximaError, Result};
use crate::store::{doc_id, CommandDoc, DocumentStore};

const LOG_FILE: &str = "logs_simulation.jsonl";
const COMMANDS_COLLECTION: &str = "commands";

#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    /// Open a store rooted at `root`. The directory must exist.
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(ProximaError::StoreUnavailable(format!(
                "store directory not found: {}",
                root.display()
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{collection}.json"))
    }

    fn read_collection(&self, collection: &str) -> Result<Vec<serde_json::Value>> {
        let path = self.collection_path(collection);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        let docs: Vec<serde_json::Value> = serde_json::from_str(&content)
            .map_err(|e| ProximaError::Config(format!("{}: {e}", path.display())))?;
        Ok(docs)
    }

    fn write_collection(&self, collection: &str, docs: &[serde_json::Value]) -> Result<()> {
        let path = self.collection_path(collection);
        fs::write(&path, serde_json::to_string_pretty(docs)?)?;
        Ok(())
    }
}

impl DocumentStore for JsonDirStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<serde_json::Value>> {
        Ok(self
            .read_collection(collection)?
            .into_iter()
            .find(|d| doc_id(d) == Some(id)))
    }

    fn list(&self, collection: &str) -> Result<Vec<serde_json::Value>> {
        self.read_collection(collection)
    }

    fn append_log(&mut self, record: &serde_json::Value) -> Result<()> {
        let path = self.root.join(LOG_FILE);
        let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", serde_json::to_string(record)?)?;
        Ok(())
    }

    fn update_latest_state(&mut self, ws_id: &str, state: &serde_json::Value) -> Result<()> {
        let mut docs = self.read_collection("world_systems")?;
        for doc in &mut docs {
            if doc_id(doc) == Some(ws_id) {
                if let Some(obj) = doc.as_object_mut() {
                    obj.insert("latest_state".to_string(), state.clone());
                }
            }
        }
        self.write_collection("world_systems", &docs)
    }

    fn drain_commands(&mut self, experiment_id: &str) -> Result<Vec<CommandDoc>> {
        let docs = self.read_collection(COMMANDS_COLLECTION)?;
        if docs.is_empty() {
            return Ok(Vec::new());
        }
        let mut drained = Vec::new();
        let mut kept = Vec::new();
        for doc in docs {
            let for_us = doc
                .get("payload")
                .and_then(|p| p.get("experiment_id"))
                .and_then(|v| v.as_str())
                .map(|id| id == experiment_id)
                .unwrap_or(true);
            if !for_us {
                kept.push(doc);
                continue;
            }
            match serde_json::from_value::<CommandDoc>(doc.clone()) {
                Ok(command) => drained.push(command),
                // Malformed commands are dropped, not retried forever.
                Err(_) => {}
            }
        }
        self.write_collection(COMMANDS_COLLECTION, &kept)?;
        Ok(drained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CommandKind;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("proxima_store_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_missing_root_is_store_unavailable() {
        let result = JsonDirStore::open(Path::new("/nonexistent/proxima"));
        assert!(matches!(result, Err(ProximaError::StoreUnavailable(_))));
    }

    #[test]
    fn test_collection_roundtrip() {
        let dir = temp_dir("roundtrip");
        fs::write(
            dir.join("experiments.json"),
            r#"[{"id": "exp_001", "world_system_id": "ws_beta_1"}]"#,
        )
        .unwrap();

        let store = JsonDirStore::open(&dir).unwrap();
        let doc = store.get("experiments", "exp_001").unwrap().unwrap();
        assert_eq!(doc["world_system_id"], "ws_beta_1");
        assert!(store.get("experiments", "exp_999").unwrap().is_none());
        assert!(store.list("environments").unwrap().is_empty());
    }

    #[test]
    fn test_log_appends_jsonl() {
        let dir = temp_dir("log");
        let mut store = JsonDirStore::open(&dir).unwrap();
        store.append_log(&serde_json::json!({"t": 0})).unwrap();
        store.append_log(&serde_json::json!({"t": 1})).unwrap();

        let content = fs::read_to_string(dir.join(LOG_FILE)).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_commands_drained_destructively() {
        let dir = temp_dir("commands");
        let command = serde_json::json!({
            "cmd_id": "c1",
            "kind": "pause",
            "payload": {"experiment_id": "exp_001"},
            "ts": 10,
        });
        fs::write(
            dir.join("commands.json"),
            serde_json::to_string(&vec![command]).unwrap(),
        )
        .unwrap();

        let mut store = JsonDirStore::open(&dir).unwrap();
        let drained = store.drain_commands("exp_001").unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].kind, CommandKind::Pause);
        assert!(store.drain_commands("exp_001").unwrap().is_empty());
    }
}
