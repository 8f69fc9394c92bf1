//! Issue model: local custom field edits plus the remote baseline.

use crate::catalog::FieldCatalog;
use crate::codec::CodecRegistry;
use crate::diff::{build_update_payload, compute_changed_entries};
use crate::entry::FieldValueEntry;
use crate::error::Result;
use crate::field_set::FieldValueSet;
use crate::resolver::{FieldResolver, IssueContext};
use crate::snapshot::RemoteSnapshot;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// An issue's custom fields and the snapshot they are diffed against.
#[derive(Debug)]
pub struct Issue<C> {
    key: Option<String>,
    custom_fields: FieldValueSet<C>,
    original: Option<RemoteSnapshot>,
}

impl<C: FieldCatalog> Issue<C> {
    /// A new, never saved issue. Every field added to it is part of the update.
    #[must_use]
    pub const fn new(resolver: FieldResolver<C>, context: IssueContext) -> Self {
        Self {
            key: None,
            custom_fields: FieldValueSet::new(resolver, context),
            original: None,
        }
    }

    /// Build an issue from the `fields` object of a fetched issue document.
    ///
    /// Every catalog field present in `fields` becomes both an entry and a
    /// snapshot value, decoded with the codec registered for its schema type.
    ///
    /// # Errors
    /// Returns `CoreError::Cancelled` if the catalog fetch is cancelled, the
    /// catalog's error if it fails, or `CoreError::Codec` if a value has an
    /// unexpected shape for its codec.
    pub async fn from_remote(
        key: impl Into<String>,
        fields: &Map<String, Value>,
        resolver: FieldResolver<C>,
        registry: &CodecRegistry,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let key = key.into();
        let context = IssueContext::from_fields(fields);
        let definitions = resolver.fetch(None, cancel).await?;

        let mut snapshot = RemoteSnapshot::new();
        let mut entries = Vec::new();
        for def in definitions {
            let Some(wire) = fields.get(&def.id) else {
                continue;
            };
            let codec = registry.codec_for(def.schema_type.as_deref());
            let values = codec.decode(&def.name, wire)?;

            snapshot = snapshot.with_field(def.id.clone(), values.clone());
            entries.push(
                FieldValueEntry::new(def.id, values, codec)
                    .with_name(def.name)
                    .with_raw(wire.clone()),
            );
        }

        debug!(key = %key, fields = entries.len(), "Loaded remote issue");

        Ok(Self {
            key: Some(key),
            custom_fields: FieldValueSet::new(resolver, context).with_entries(entries),
            original: Some(snapshot),
        })
    }

    /// Issue key, once the issue exists remotely.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Project and issue type of the issue.
    #[must_use]
    pub const fn context(&self) -> &IssueContext {
        self.custom_fields.context()
    }

    /// Current custom field values.
    #[must_use]
    pub const fn custom_fields(&self) -> &FieldValueSet<C> {
        &self.custom_fields
    }

    /// Current custom field values, for editing.
    pub fn custom_fields_mut(&mut self) -> &mut FieldValueSet<C> {
        &mut self.custom_fields
    }

    /// The baseline the update is computed against, if the issue was fetched.
    #[must_use]
    pub const fn original(&self) -> Option<&RemoteSnapshot> {
        self.original.as_ref()
    }

    /// Entries that differ from the baseline.
    #[must_use]
    pub fn changed_fields(&self) -> Vec<&FieldValueEntry> {
        compute_changed_entries(self.custom_fields.entries(), self.original.as_ref())
    }

    /// The `fields` object to send in an update request.
    ///
    /// # Errors
    /// Returns `CoreError::Codec` if any changed entry fails to encode.
    pub fn update_payload(&self) -> Result<Map<String, Value>> {
        build_update_payload(self.changed_fields())
    }

    /// Record a successful save: the current values become the new baseline.
    pub fn mark_saved(&mut self, key: Option<String>) {
        if key.is_some() {
            self.key = key;
        }
        self.original = Some(RemoteSnapshot::from_saved(self.custom_fields.entries()));
    }
}
