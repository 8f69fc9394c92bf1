//! Incremental update computation.
//!
//! The remote API treats an omitted field as "leave unchanged", so an update
//! carries only the entries that differ from the snapshot taken at fetch
//! time. Each entry is classified independently:
//!
//! | snapshot            | current  | sent               |
//! |---------------------|----------|--------------------|
//! | absent entirely     | any      | yes (new issue)    |
//! | id missing          | any      | yes                |
//! | uninitialized       | any      | yes                |
//! | values              | `None`   | yes (clear)        |
//! | values, equal       | values   | no                 |
//! | values, different   | values   | yes                |
//! | cleared by us       | `None`   | no                 |
//! | cleared by us       | values   | yes                |

use crate::entry::FieldValueEntry;
use crate::error::Result;
use crate::snapshot::{RemoteSnapshot, SnapshotValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Why an entry is part of an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    /// The issue has no snapshot at all.
    NoSnapshot,
    /// The snapshot does not contain the field.
    Added,
    /// The server reported the field with no value.
    RemoteUninitialized,
    /// The field had values and is now cleared.
    Cleared,
    /// The values differ (order-sensitive).
    Modified,
}

impl std::fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSnapshot => write!(f, "no_snapshot"),
            Self::Added => write!(f, "added"),
            Self::RemoteUninitialized => write!(f, "remote_uninitialized"),
            Self::Cleared => write!(f, "cleared"),
            Self::Modified => write!(f, "modified"),
        }
    }
}

/// Classify one entry against the snapshot. `None` means unchanged.
#[must_use]
pub fn classify(entry: &FieldValueEntry, original: Option<&RemoteSnapshot>) -> Option<ChangeReason> {
    let Some(original) = original else {
        return Some(ChangeReason::NoSnapshot);
    };

    match (original.get(entry.id()), entry.values()) {
        (None, _) => Some(ChangeReason::Added),
        (Some(SnapshotValue::Uninitialized), _) => Some(ChangeReason::RemoteUninitialized),
        (Some(SnapshotValue::Values(_)), None) => Some(ChangeReason::Cleared),
        (Some(SnapshotValue::Values(old)), Some(new)) if old.as_slice() == new => None,
        (Some(SnapshotValue::Values(_) | SnapshotValue::Cleared), Some(_)) => {
            Some(ChangeReason::Modified)
        }
        (Some(SnapshotValue::Cleared), None) => None,
    }
}

/// Entries that must be sent, in their original order.
#[must_use]
pub fn compute_changed_entries<'a>(
    current: &'a [FieldValueEntry],
    original: Option<&RemoteSnapshot>,
) -> Vec<&'a FieldValueEntry> {
    let changed: Vec<_> = current
        .iter()
        .filter(|entry| match classify(entry, original) {
            Some(reason) => {
                debug!(id = %entry.id(), %reason, "Field changed");
                true
            }
            None => false,
        })
        .collect();

    debug!(total = current.len(), changed = changed.len(), "Computed field changes");
    changed
}

/// Encode changed entries into the `fields` object of an update request.
///
/// A cleared "components" field is sent as `[]`, since the server rejects
/// `null` for it. When an id repeats, the later entry wins.
///
/// # Errors
/// Returns `CoreError::Codec` if any entry fails to encode; nothing is
/// emitted in that case.
pub fn build_update_payload<'a>(
    changed: impl IntoIterator<Item = &'a FieldValueEntry>,
) -> Result<Map<String, Value>> {
    let mut fields = Map::new();

    for entry in changed {
        let mut value = entry.encode()?;
        if value.is_null() && entry.is_components() {
            value = Value::Array(Vec::new());
        }
        fields.insert(entry.id().to_string(), value);
    }

    Ok(fields)
}
