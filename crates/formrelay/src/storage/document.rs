//! In-memory form of the store file.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::record::Record;

/// The full timestamp-to-record mapping held in the store file.
///
/// Entries keep insertion order, which is arrival order. Inserting an
/// existing key replaces its record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Store {
    entries: IndexMap<String, Record>,
}

impl Store {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record under `timestamp`, returning the record it replaced.
    pub fn insert(&mut self, timestamp: String, record: Record) -> Option<Record> {
        self.entries.insert(timestamp, record)
    }

    /// Get the record stored under `timestamp`.
    #[must_use]
    pub fn get(&self, timestamp: &str) -> Option<&Record> {
        self.entries.get(timestamp)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Record)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Render as indented JSON, four spaces per level.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_pretty_json(&self) -> serde_json::Result<Vec<u8>> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)?;
        Ok(out)
    }
}
