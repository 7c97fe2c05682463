//! Shared stage memory (C3): a per-session key/value store plus an
//! append-only audit log of every store/retrieve call (§4.3, invariant P4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEvent {
    pub key: String,
    pub producer: String,
    pub action: MemoryAction,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryAction {
    Store,
    Retrieve,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageMemoryItem {
    pub key: String,
    pub content: serde_json::Value,
    pub producer: String,
    pub stored_at: DateTime<Utc>,
}

/// Per-session store. Every write is a new event — existing keys are
/// overwritten in the map but the audit log keeps every `store` call, so
/// downstream readers can reconstruct the full history if needed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageMemory {
    items: HashMap<String, StageMemoryItem>,
    events: Vec<MemoryEvent>,
}

impl StageMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&mut self, key: impl Into<String>, content: serde_json::Value, producer: impl Into<String>) {
        let key = key.into();
        let producer = producer.into();
        let now = Utc::now();
        self.events.push(MemoryEvent {
            key: key.clone(),
            producer: producer.clone(),
            action: MemoryAction::Store,
            at: now,
        });
        self.items.insert(
            key.clone(),
            StageMemoryItem {
                key,
                content,
                producer,
                stored_at: now,
            },
        );
    }

    pub fn retrieve(&mut self, key: &str, reader: impl Into<String>) -> Option<&StageMemoryItem> {
        self.events.push(MemoryEvent {
            key: key.to_string(),
            producer: reader.into(),
            action: MemoryAction::Retrieve,
            at: Utc::now(),
        });
        self.items.get(key)
    }

    pub fn events(&self) -> &[MemoryEvent] {
        &self.events
    }

    /// For each key currently in the store, there is exactly one `store`
    /// event in the audit log bearing that key and the item's producer (P4).
    pub fn attribution_holds(&self) -> bool {
        self.items.values().all(|item| {
            self.events
                .iter()
                .filter(|e| e.action == MemoryAction::Store && e.key == item.key && e.producer == item.producer)
                .count()
                >= 1
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn store_then_retrieve_round_trips() {
        let mut mem = StageMemory::new();
        mem.store("github-analysis", json!({"owner": "acme"}), "inspector");
        let item = mem.retrieve("github-analysis", "context-analyzer").unwrap();
        assert_eq!(item.producer, "inspector");
        assert_eq!(item.content["owner"], "acme");
    }

    #[test]
    fn attribution_invariant_holds_after_writes() {
        let mut mem = StageMemory::new();
        mem.store("a", json!(1), "p1");
        mem.store("b", json!(2), "p2");
        mem.retrieve("a", "reader");
        assert!(mem.attribution_holds());
    }

    #[test]
    fn retrieve_missing_key_returns_none() {
        let mut mem = StageMemory::new();
        assert!(mem.retrieve("absent", "reader").is_none());
    }
}
