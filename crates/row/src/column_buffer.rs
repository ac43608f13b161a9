//! `ColumnBuffer`: the decoded, in-memory row representation (spec §3/§4.2).

use corvid_value::Value;
use smallvec::SmallVec;

use crate::error::{Result, RowError};

/// Ordered `(name, Value)` pairs. Most rows have a handful of columns, so
/// entries live inline up to 8 before spilling to the heap.
#[derive(Debug, Clone, Default)]
pub struct ColumnBuffer {
    entries: SmallVec<[(String, Value); 8]>,
}

impl ColumnBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            entries: SmallVec::with_capacity(cap),
        }
    }

    pub fn add(&mut self, name: impl Into<String>, value: Value) {
        self.entries.push((name.into(), value));
    }

    /// First matching entry by name; duplicate names keep the first, per
    /// spec §4.2.
    pub fn get(&self, name: &str) -> Result<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| RowError::ColumnNotFound(name.to_string()))
    }

    pub fn try_get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iterate(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replaces the value of the first entry with this name in place;
    /// appends a new entry if absent.
    pub fn replace(&mut self, name: &str, value: Value) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value;
        } else {
            self.add(name.to_string(), value);
        }
    }

    pub fn delete(&mut self, name: &str) {
        self.entries.retain(|(n, _)| n != name);
    }

    /// Appends all of `other`'s columns, used by `Project(*)` wildcard
    /// expansion and by row-construction helpers that splice rows together.
    pub fn copy_from(&mut self, other: &ColumnBuffer) {
        for (name, value) in other.iterate() {
            self.add(name.to_string(), value.clone());
        }
    }

    #[cfg(feature = "serde")]
    pub fn marshal_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::with_capacity(self.entries.len());
        for (name, value) in self.iterate() {
            map.insert(name.to_string(), value.to_json());
        }
        serde_json::Value::Object(map)
    }
}

impl FromIterator<(String, Value)> for ColumnBuffer {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
