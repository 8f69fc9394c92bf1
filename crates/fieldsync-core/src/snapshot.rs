//! Remote field state captured when an issue was fetched.

use crate::entry::FieldValueEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// State of one field in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotValue {
    /// The server reported the field with no value.
    Uninitialized,
    /// The field held these values.
    Values(Vec<String>),
    /// The field was explicitly cleared by an update from this client.
    Cleared,
}

/// Field id to value mapping used as the diff baseline.
///
/// Never mutated by local edits; replaced wholesale after a save or re-fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,

    fields: BTreeMap<String, SnapshotValue>,
}

impl Default for RemoteSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteSnapshot {
    /// An empty snapshot taken now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            taken_at: Utc::now(),
            fields: BTreeMap::new(),
        }
    }

    /// Record a field as read from the server; `None` means it had no value.
    #[must_use]
    pub fn with_field(mut self, id: impl Into<String>, values: Option<Vec<String>>) -> Self {
        let value = values.map_or(SnapshotValue::Uninitialized, SnapshotValue::Values);
        self.fields.insert(id.into(), value);
        self
    }

    /// Snapshot of entries that were just written to the server.
    ///
    /// Cleared entries are recorded as [`SnapshotValue::Cleared`]; when an id
    /// appears more than once the last entry wins, as it does on the wire.
    #[must_use]
    pub fn from_saved<'a>(entries: impl IntoIterator<Item = &'a FieldValueEntry>) -> Self {
        let fields = entries
            .into_iter()
            .map(|e| {
                let value = e
                    .values()
                    .map_or(SnapshotValue::Cleared, |v| SnapshotValue::Values(v.to_vec()));
                (e.id().to_string(), value)
            })
            .collect();
        Self {
            taken_at: Utc::now(),
            fields,
        }
    }

    /// State of a field, or `None` when the snapshot does not contain it.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&SnapshotValue> {
        self.fields.get(id)
    }

    /// Whether the snapshot contains the field.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.fields.contains_key(id)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the snapshot has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SnapshotValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}
