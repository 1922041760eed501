use daylife_schemas::ContextKey;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Persona-wide state read by every pipeline stage on every day.
///
/// Each call is atomic on its own. A `get` followed by a `set` is not: two
/// days may interleave between them.
#[derive(Debug)]
pub struct SharedContext {
    values: Mutex<BTreeMap<ContextKey, Value>>,
}

impl Default for SharedContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedContext {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(empty_values()),
        }
    }

    /// Owned copy of the value; mutating it does not touch the stored state
    pub fn get(&self, key: ContextKey) -> Value {
        self.lock().get(&key).cloned().unwrap_or(Value::Null)
    }

    /// String values as-is; other values as compact JSON; null as empty
    pub fn get_text(&self, key: ContextKey) -> String {
        match self.get(key) {
            Value::Null => String::new(),
            Value::String(text) => text,
            other => other.to_string(),
        }
    }

    pub fn set(&self, key: ContextKey, value: Value) {
        debug!("Shared context set {}", key);
        self.lock().insert(key, value);
    }

    /// Replace several values under one lock acquisition
    pub fn batch_set(&self, entries: impl IntoIterator<Item = (ContextKey, Value)>) {
        let mut values = self.lock();
        for (key, value) in entries {
            values.insert(key, value);
        }
    }

    pub fn reset(&self) {
        *self.lock() = empty_values();
    }

    pub fn snapshot(&self) -> BTreeMap<ContextKey, Value> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<ContextKey, Value>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn empty_values() -> BTreeMap<ContextKey, Value> {
    ContextKey::ALL.iter().map(|key| (*key, Value::Null)).collect()
}
