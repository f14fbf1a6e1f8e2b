//! Graph-scoped named resources.
//!
//! A [`Registry`] is built alongside the graph and handed to every component
//! through its init and execute contexts. It replaces process-wide lookup
//! tables: two graphs in one process never share state unless they are given
//! the same registry.

use crate::error::{FlowError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Declaration of a numeric sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceDef {
    pub name: String,
    #[serde(default)]
    pub start: i64,
    #[serde(default = "default_step")]
    pub step: i64,
}

fn default_step() -> i64 {
    1
}

/// Thread-safe counter shared by all components of a graph.
#[derive(Debug)]
pub struct Sequence {
    name: String,
    start: i64,
    step: i64,
    next: AtomicI64,
}

impl Sequence {
    pub fn new(def: &SequenceDef) -> Self {
        Self {
            name: def.name.clone(),
            start: def.start,
            step: def.step,
            next: AtomicI64::new(def.start),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the current value and advance by one step.
    pub fn next_value(&self) -> i64 {
        self.next.fetch_add(self.step, Ordering::SeqCst)
    }

    /// Value the next call to [`next_value`](Self::next_value) returns.
    pub fn current_value(&self) -> i64 {
        self.next.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.next.store(self.start, Ordering::SeqCst);
    }
}

/// Named sequences and a string dictionary.
#[derive(Debug, Default)]
pub struct Registry {
    sequences: HashMap<String, Arc<Sequence>>,
    dictionary: RwLock<HashMap<String, String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sequence(mut self, def: SequenceDef) -> Self {
        self.sequences
            .insert(def.name.clone(), Arc::new(Sequence::new(&def)));
        self
    }

    pub fn with_entry(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.dictionary.write().insert(key.into(), value.into());
        self
    }

    pub fn sequence(&self, name: &str) -> Result<Arc<Sequence>> {
        self.sequences
            .get(name)
            .cloned()
            .ok_or_else(|| FlowError::Configuration(format!("Unknown sequence '{}'", name)))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.dictionary.read().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.dictionary.write().insert(key.into(), value.into());
    }

    /// Reset every sequence to its start value.
    pub fn reset(&self) {
        for seq in self.sequences.values() {
            seq.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence() {
        let registry = Registry::new().with_sequence(SequenceDef {
            name: "ids".into(),
            start: 10,
            step: 5,
        });
        let seq = registry.sequence("ids").unwrap();
        assert_eq!(seq.next_value(), 10);
        assert_eq!(seq.next_value(), 15);
        registry.reset();
        assert_eq!(seq.current_value(), 10);
        assert!(registry.sequence("nope").is_err());
    }

    #[test]
    fn test_dictionary() {
        let registry = Registry::new().with_entry("run", "nightly");
        assert_eq!(registry.get("run").as_deref(), Some("nightly"));
        registry.set("run", "manual");
        assert_eq!(registry.get("run").as_deref(), Some("manual"));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_sequence_def_defaults() {
        let def: SequenceDef = serde_json::from_str(r#"{"name": "s"}"#).unwrap();
        assert_eq!(def.start, 0);
        assert_eq!(def.step, 1);
    }
}
