//! Run-scoped map from address string to resolved coordinate.

use std::collections::HashMap;

use civicmap_shared::Coordinates;

/// Coordinates resolved so far in one pipeline run.
///
/// Entries are never overwritten: the first writer for a key wins and later
/// passes can only fill keys that are still absent.
#[derive(Debug, Clone, Default)]
pub struct CoordinateRegistry {
    entries: HashMap<String, Coordinates>,
}

impl CoordinateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `coordinates` under `key` unless the key is already set.
    ///
    /// Returns `true` when the entry was added.
    pub fn insert_if_absent(&mut self, key: &str, coordinates: Coordinates) -> bool {
        if self.entries.contains_key(key) {
            return false;
        }
        self.entries.insert(key.to_string(), coordinates);
        true
    }

    pub fn get(&self, key: &str) -> Option<Coordinates> {
        self.entries.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Coordinates)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
