//! Aged backlog queue shared by the sectors
//!
//! Requests that cannot be served immediately wait here and are re-attempted
//! every step. Entries older than the configured cap are dropped and counted,
//! so a dead requester cannot pin a queue forever.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::types::Step;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacklogEntry<T> {
    pub item: T,
    pub enqueued_at: Step,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct Backlog<T> {
    entries: Vec<BacklogEntry<T>>,
}

impl<T> Default for Backlog<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Serialize + DeserializeOwned> Backlog<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: T, t: Step) {
        self.entries.push(BacklogEntry {
            item,
            enqueued_at: t,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries that have waited longer than `max_age_steps`; returns
    /// how many expired. An entry enqueued at `t0` expires at the first
    /// step where `t - t0 > max_age_steps`.
    pub fn expire(&mut self, t: Step, max_age_steps: Step) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|entry| t.saturating_sub(entry.enqueued_at) <= max_age_steps);
        before - self.entries.len()
    }

    /// Attempt each entry newest-first (LIFO); entries for which `attempt`
    /// returns true are removed.
    pub fn drain_lifo(&mut self, mut attempt: impl FnMut(&T) -> bool) {
        let mut index = self.entries.len();
        while index > 0 {
            index -= 1;
            if attempt(&self.entries[index].item) {
                self.entries.remove(index);
            }
        }
    }

    /// Attempt each entry oldest-first (FIFO); entries for which `attempt`
    /// returns true are removed.
    pub fn drain_fifo(&mut self, mut attempt: impl FnMut(&T) -> bool) {
        let mut index = 0;
        while index < self.entries.len() {
            if attempt(&self.entries[index].item) {
                self.entries.remove(index);
            } else {
                index += 1;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|e| &e.item)
    }
}
