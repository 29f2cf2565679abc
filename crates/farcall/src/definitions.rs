//! Definition Registry
//!
//! Definitions are JavaScript function source text keyed by a caller-chosen
//! command name. The registry is append-only: registering a key twice keeps
//! both entries, and the remote context resolves the command to the one
//! registered last.

use serde::{Deserialize, Serialize};

/// A named function body to install in the remote context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub key: String,
    /// Function source, e.g. `(a, b) => a + b` or `function (x) { return x; }`.
    pub source: String,
}

impl Definition {
    pub fn new(key: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            source: source.into(),
        }
    }
}

/// Ordered, append-only list of definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefinitionRegistry {
    entries: Vec<Definition>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `{key, source}`. Duplicate keys are kept.
    pub fn register(&mut self, key: impl Into<String>, source: impl Into<String>) {
        self.entries.push(Definition::new(key, source));
    }

    pub fn push(&mut self, definition: Definition) {
        self.entries.push(definition);
    }

    /// Entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Definition> {
        self.entries.iter()
    }

    /// The definition a command resolves to: the last one registered under `key`.
    pub fn get(&self, key: &str) -> Option<&Definition> {
        self.entries.iter().rev().find(|d| d.key == key)
    }

    /// Distinct keys in first-registration order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for definition in &self.entries {
            if !keys.contains(&definition.key.as_str()) {
                keys.push(&definition.key);
            }
        }
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Definition> for DefinitionRegistry {
    fn from_iter<I: IntoIterator<Item = Definition>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Extend<Definition> for DefinitionRegistry {
    fn extend<I: IntoIterator<Item = Definition>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl<'a> IntoIterator for &'a DefinitionRegistry {
    type Item = &'a Definition;
    type IntoIter = std::slice::Iter<'a, Definition>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
