//! Repetition guard.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;

const WINDOW: usize = 2;

/// Tool name plus arguments with object keys sorted at every depth.
pub fn call_signature(name: &str, arguments: &Value) -> String {
    format!("{name}:{}", canonical(arguments))
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (key, inner) in entries {
                sorted.insert(key.clone(), canonical(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

/// Remembers the last two call signatures of a turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepetitionGuard {
    recent: VecDeque<String>,
}

impl RepetitionGuard {
    /// Record `signature`. Returns true if it matches one of the two
    /// previous signatures.
    pub fn observe(&mut self, signature: String) -> bool {
        if self.recent.contains(&signature) {
            return true;
        }
        self.recent.push_back(signature);
        while self.recent.len() > WINDOW {
            self.recent.pop_front();
        }
        false
    }

    pub fn recent(&self) -> impl Iterator<Item = &str> {
        self.recent.iter().map(String::as_str)
    }
}
