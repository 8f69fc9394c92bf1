//! The mutable collection of custom field values attached to an issue.

use crate::catalog::FieldCatalog;
use crate::codec::{CodecRegistry, ValueCodec};
use crate::entry::FieldValueEntry;
use crate::error::Result;
use crate::resolver::{FieldResolver, IssueContext};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Parent and optional child option of a cascading select field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadingSelection {
    pub parent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child: Option<String>,
}

/// Ordered custom field values of one issue.
///
/// Names are resolved to ids eagerly, when an entry is added or looked up.
/// Ids are not deduplicated; lookups return the first matching entry.
#[derive(Debug)]
pub struct FieldValueSet<C> {
    resolver: FieldResolver<C>,
    context: IssueContext,
    search_by_project_only: bool,
    entries: Vec<FieldValueEntry>,
}

impl<C: FieldCatalog> FieldValueSet<C> {
    /// Create an empty set for an issue context.
    #[must_use]
    pub const fn new(resolver: FieldResolver<C>, context: IssueContext) -> Self {
        Self {
            resolver,
            context,
            search_by_project_only: false,
            entries: Vec::new(),
        }
    }

    /// Seed the set with existing entries.
    #[must_use]
    pub fn with_entries(mut self, entries: impl IntoIterator<Item = FieldValueEntry>) -> Self {
        self.entries.extend(entries);
        self
    }

    /// Always resolve names within the issue's project, even when the
    /// unscoped catalog has a single match.
    #[must_use]
    pub fn with_search_by_project_only(mut self, enabled: bool) -> Self {
        self.search_by_project_only = enabled;
        self
    }

    /// Whether names are always resolved within the issue's project.
    #[must_use]
    pub const fn search_by_project_only(&self) -> bool {
        self.search_by_project_only
    }

    /// Change the project-only resolution flag.
    pub fn set_search_by_project_only(&mut self, enabled: bool) {
        self.search_by_project_only = enabled;
    }

    /// Issue context used for resolution.
    #[must_use]
    pub const fn context(&self) -> &IssueContext {
        &self.context
    }

    /// Resolve a field name to its id under this set's issue context.
    ///
    /// # Errors
    /// Propagates resolution failures and cancellation.
    pub async fn resolve(&self, name: &str, cancel: &CancellationToken) -> Result<String> {
        self.resolver
            .resolve(name, &self.context, self.search_by_project_only, cancel)
            .await
    }

    /// Add a field by name with the default (select) codec.
    ///
    /// # Errors
    /// Propagates resolution failures and cancellation.
    pub async fn add_by_name(
        &mut self,
        name: &str,
        values: impl IntoIterator<Item = impl Into<String>>,
        cancel: &CancellationToken,
    ) -> Result<&mut Self> {
        let values = values.into_iter().map(Into::into).collect();
        self.add_with_codec(name, Some(values), ValueCodec::default(), cancel)
            .await
    }

    /// Add a single-valued field by name.
    ///
    /// # Errors
    /// Propagates resolution failures and cancellation.
    pub async fn add_single(
        &mut self,
        name: &str,
        value: impl Into<String>,
        cancel: &CancellationToken,
    ) -> Result<&mut Self> {
        self.add_by_name(name, [value], cancel).await
    }

    /// Add a field by name whose wire form is a plain string array.
    ///
    /// # Errors
    /// Propagates resolution failures and cancellation.
    pub async fn add_array(
        &mut self,
        name: &str,
        values: impl IntoIterator<Item = impl Into<String>>,
        cancel: &CancellationToken,
    ) -> Result<&mut Self> {
        let values = values.into_iter().map(Into::into).collect();
        self.add_with_codec(name, Some(values), ValueCodec::MultiString, cancel)
            .await
    }

    /// Add a cascading select field. An absent or empty child is omitted.
    ///
    /// # Errors
    /// Propagates resolution failures and cancellation.
    pub async fn add_cascading(
        &mut self,
        name: &str,
        parent: impl Into<String>,
        child: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<&mut Self> {
        let mut values = vec![parent.into()];
        if let Some(child) = child.filter(|c| !c.is_empty()) {
            values.push(child.to_string());
        }
        self.add_with_codec(name, Some(values), ValueCodec::Cascading, cancel)
            .await
    }

    /// Add a field by name with an explicit codec. `None` values mark the
    /// field as cleared.
    ///
    /// # Errors
    /// Propagates resolution failures and cancellation.
    pub async fn add_with_codec(
        &mut self,
        name: &str,
        values: Option<Vec<String>>,
        codec: ValueCodec,
        cancel: &CancellationToken,
    ) -> Result<&mut Self> {
        let id = self.resolve(name, cancel).await?;
        debug!(field = %name, id = %id, codec = codec.name(), "Adding field value");
        self.entries
            .push(FieldValueEntry::new(id, values, codec).with_name(name));
        Ok(self)
    }

    /// Add a field by id, skipping name resolution.
    pub fn add_by_id(
        &mut self,
        id: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        let values = values.into_iter().map(Into::into).collect();
        self.add_by_id_with_codec(id, Some(values), ValueCodec::default())
    }

    /// Add a field by id with an explicit codec.
    pub fn add_by_id_with_codec(
        &mut self,
        id: impl Into<String>,
        values: Option<Vec<String>>,
        codec: ValueCodec,
    ) -> &mut Self {
        self.entries.push(FieldValueEntry::new(id, values, codec));
        self
    }

    /// Set the values of a field by name, updating the existing entry when
    /// present (keeping its codec) and adding one otherwise.
    ///
    /// # Errors
    /// Propagates resolution failures and cancellation.
    pub async fn assign(
        &mut self,
        name: &str,
        values: Option<Vec<String>>,
        codec: ValueCodec,
        cancel: &CancellationToken,
    ) -> Result<&mut Self> {
        let id = self.resolve(name, cancel).await?;
        Ok(self.upsert(id, Some(name), values, codec))
    }

    /// Like [`Self::assign`], but a new entry takes the codec `registry` maps
    /// the field's schema type to.
    ///
    /// # Errors
    /// Propagates resolution failures and cancellation.
    pub async fn assign_from_schema(
        &mut self,
        name: &str,
        values: Option<Vec<String>>,
        registry: &CodecRegistry,
        cancel: &CancellationToken,
    ) -> Result<&mut Self> {
        let def = self
            .resolver
            .resolve_definition(name, &self.context, self.search_by_project_only, cancel)
            .await?;
        let codec = registry.codec_for(def.schema_type.as_deref());
        Ok(self.upsert(def.id, Some(name), values, codec))
    }

    /// Set the values of a field by id. A new entry uses `codec` when given,
    /// otherwise the codec `registry` maps the field's schema type to.
    ///
    /// # Errors
    /// Propagates catalog failures and cancellation.
    pub async fn assign_by_id(
        &mut self,
        id: &str,
        values: Option<Vec<String>>,
        codec: Option<ValueCodec>,
        registry: &CodecRegistry,
        cancel: &CancellationToken,
    ) -> Result<&mut Self> {
        let codec = match codec {
            Some(codec) => codec,
            None if self.get_by_id(id).is_some() => ValueCodec::default(),
            None => {
                let def = self.resolver.definition_by_id(id, cancel).await?;
                registry.codec_for(def.as_ref().and_then(|d| d.schema_type.as_deref()))
            }
        };
        Ok(self.upsert(id.to_string(), None, values, codec))
    }

    fn upsert(
        &mut self,
        id: String,
        name: Option<&str>,
        values: Option<Vec<String>>,
        codec: ValueCodec,
    ) -> &mut Self {
        if let Some(entry) = self.get_by_id_mut(&id) {
            entry.set_values(values);
        } else {
            debug!(id = %id, codec = codec.name(), "Adding field value");
            let entry = FieldValueEntry::new(id, values, codec);
            self.entries.push(match name {
                Some(name) => entry.with_name(name),
                None => entry,
            });
        }
        self
    }

    /// Clear a field by name, so the update explicitly empties it.
    ///
    /// # Errors
    /// Propagates resolution failures and cancellation.
    pub async fn clear(&mut self, name: &str, cancel: &CancellationToken) -> Result<&mut Self> {
        self.assign(name, None, ValueCodec::default(), cancel).await
    }

    /// Look up a field by name.
    ///
    /// Returns `Ok(None)` when the field resolves but has no entry.
    ///
    /// # Errors
    /// Resolution failures are returned, not folded into `None`.
    pub async fn lookup_by_name(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<&FieldValueEntry>> {
        let id = self.resolve(name, cancel).await?;
        Ok(self.get_by_id(&id))
    }

    /// Read a cascading select field by name.
    ///
    /// # Errors
    /// Propagates resolution failures and cancellation.
    pub async fn cascading(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<CascadingSelection>> {
        let selection = self
            .lookup_by_name(name, cancel)
            .await?
            .and_then(FieldValueEntry::values)
            .and_then(|values| {
                values.first().map(|parent| CascadingSelection {
                    parent: parent.clone(),
                    child: values.get(1).cloned(),
                })
            });
        Ok(selection)
    }

    /// Deserialize a field's wire value as `T`. Absent or empty fields yield
    /// `T::default()`.
    ///
    /// # Errors
    /// Propagates resolution failures, cancellation and `CoreError::Codec`.
    pub async fn decode_as<T: DeserializeOwned + Default>(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<T> {
        match self.lookup_by_name(name, cancel).await? {
            Some(entry) => entry.decode_as(),
            None => Ok(T::default()),
        }
    }
}

impl<C> FieldValueSet<C> {
    /// First entry with the given id.
    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<&FieldValueEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    /// First entry with the given id, mutably.
    pub fn get_by_id_mut(&mut self, id: &str) -> Option<&mut FieldValueEntry> {
        self.entries.iter_mut().find(|e| e.id() == id)
    }

    /// All entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[FieldValueEntry] {
        &self.entries
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, FieldValueEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a, C> IntoIterator for &'a FieldValueSet<C> {
    type Item = &'a FieldValueEntry;
    type IntoIter = std::slice::Iter<'a, FieldValueEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::CountingCatalog;
    use crate::catalog::InMemoryCatalog;
    use crate::definition::FieldDefinition;
    use crate::error::CoreError;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::json;

    fn set() -> FieldValueSet<CountingCatalog> {
        let catalog = InMemoryCatalog::new([
            FieldDefinition::new("customfield_1", "Region"),
            FieldDefinition::new("customfield_2", "Team"),
            FieldDefinition::new("customfield_3", "Story Points"),
            FieldDefinition::new("customfield_4", "Labels Extra"),
        ]);
        FieldValueSet::new(
            FieldResolver::new(CountingCatalog::new(catalog)),
            IssueContext::new("OPS"),
        )
    }

    #[tokio::test]
    async fn test_fluent_adds() {
        let cancel = CancellationToken::new();
        let mut fields = set();

        fields
            .add_by_name("Team", ["Core"], &cancel)
            .await
            .unwrap()
            .add_single("Story Points", "5", &cancel)
            .await
            .unwrap()
            .add_by_id("customfield_9", ["x"]);

        let ids: Vec<_> = fields.iter().map(FieldValueEntry::id).collect();
        assert_eq!(ids, vec!["customfield_2", "customfield_3", "customfield_9"]);
        assert_eq!(fields.entries()[0].name(), Some("Team"));
        assert_eq!(fields.entries()[2].name(), None);
    }

    #[tokio::test]
    async fn test_cascading_parent_only() {
        let cancel = CancellationToken::new();
        let mut fields = set();

        fields.add_cascading("Region", "EMEA", None, &cancel).await.unwrap();

        let entry = fields.lookup_by_name("region", &cancel).await.unwrap().unwrap();
        assert_eq!(entry.values(), Some(&["EMEA".to_string()][..]));
        assert_eq!(entry.codec(), &ValueCodec::Cascading);
    }

    #[tokio::test]
    async fn test_cascading_parent_and_child() {
        let cancel = CancellationToken::new();
        let mut fields = set();

        fields
            .add_cascading("Region", "EMEA", Some("Berlin"), &cancel)
            .await
            .unwrap();

        let entry = fields.lookup_by_name("Region", &cancel).await.unwrap().unwrap();
        assert_eq!(
            entry.values(),
            Some(&["EMEA".to_string(), "Berlin".to_string()][..])
        );

        let selection = fields.cascading("Region", &cancel).await.unwrap();
        assert_eq!(
            selection,
            Some(CascadingSelection {
                parent: "EMEA".into(),
                child: Some("Berlin".into())
            })
        );
    }

    #[tokio::test]
    async fn test_cascading_empty_child_omitted() {
        let cancel = CancellationToken::new();
        let mut fields = set();

        fields.add_cascading("Region", "EMEA", Some(""), &cancel).await.unwrap();

        let entry = fields.get_by_id("customfield_1").unwrap();
        assert_eq!(entry.values().map(<[String]>::len), Some(1));
    }

    #[tokio::test]
    async fn test_lookup_absent_vs_unresolvable() {
        let cancel = CancellationToken::new();
        let fields = set();

        assert!(fields.lookup_by_name("Team", &cancel).await.unwrap().is_none());

        let err = fields.lookup_by_name("Nope", &cancel).await.unwrap_err();
        assert!(matches!(err, CoreError::FieldNotFound { .. }));
    }

    #[tokio::test]
    async fn test_lookup_returns_first_duplicate() {
        let cancel = CancellationToken::new();
        let mut fields = set();

        fields.add_by_name("Team", ["A"], &cancel).await.unwrap();
        fields.add_by_name("Team", ["B"], &cancel).await.unwrap();

        let entry = fields.lookup_by_name("Team", &cancel).await.unwrap().unwrap();
        assert_eq!(entry.values(), Some(&["A".to_string()][..]));
        assert_eq!(fields.len(), 2);
    }

    #[tokio::test]
    async fn test_assign_updates_existing_entry() {
        let cancel = CancellationToken::new();
        let mut fields = set();

        fields.add_array("Labels Extra", ["a"], &cancel).await.unwrap();
        fields
            .assign("Labels Extra", Some(vec!["b".into()]), ValueCodec::Select, &cancel)
            .await
            .unwrap();

        assert_eq!(fields.len(), 1);
        let entry = &fields.entries()[0];
        assert_eq!(entry.values(), Some(&["b".to_string()][..]));
        assert_eq!(entry.codec(), &ValueCodec::MultiString);
    }

    #[tokio::test]
    async fn test_clear_marks_none() {
        let cancel = CancellationToken::new();
        let mut fields = set();

        fields.add_by_name("Team", ["A"], &cancel).await.unwrap();
        fields.clear("Team", &cancel).await.unwrap();

        assert_eq!(fields.entries()[0].values(), None);
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct SelectOption {
        value: String,
    }

    #[tokio::test]
    async fn test_decode_as() {
        let cancel = CancellationToken::new();
        let fields = set().with_entries([FieldValueEntry::new(
            "customfield_3",
            Some(vec!["8".into()]),
            ValueCodec::Select,
        )
        .with_raw(json!(8))]);

        let points: u32 = fields.decode_as("Story Points", &cancel).await.unwrap();
        assert_eq!(points, 8);

        let absent: Vec<SelectOption> = fields.decode_as("Team", &cancel).await.unwrap();
        assert!(absent.is_empty());
    }

    #[tokio::test]
    async fn test_search_by_project_only_forces_scope() {
        let cancel = CancellationToken::new();
        let fields = set().with_search_by_project_only(true);

        fields.resolve("Team", &cancel).await.unwrap();
        assert_eq!(fields.resolver.catalog().scoped_calls(), 1);
    }

    const LABELS_SCHEMA: &str = "com.atlassian.jira.plugin.system.customfieldtypes:labels";

    fn schema_set() -> FieldValueSet<InMemoryCatalog> {
        let catalog = InMemoryCatalog::new([
            FieldDefinition::new("customfield_7", "Tags").with_schema_type(LABELS_SCHEMA),
            FieldDefinition::new("customfield_8", "Severity"),
        ]);
        FieldValueSet::new(FieldResolver::new(catalog), IssueContext::new("OPS"))
    }

    #[tokio::test]
    async fn test_assign_from_schema_uses_registered_codec() {
        let cancel = CancellationToken::new();
        let registry = CodecRegistry::default();
        let mut fields = schema_set();

        fields
            .assign_from_schema("tags", Some(vec!["a".into(), "b".into()]), &registry, &cancel)
            .await
            .unwrap()
            .assign_from_schema("Severity", Some(vec!["High".into()]), &registry, &cancel)
            .await
            .unwrap();

        let tags = fields.get_by_id("customfield_7").unwrap();
        assert_eq!(tags.codec(), &ValueCodec::MultiString);
        assert_eq!(tags.encode().unwrap(), json!(["a", "b"]));
        assert_eq!(fields.get_by_id("customfield_8").unwrap().codec(), &ValueCodec::Select);
    }

    #[tokio::test]
    async fn test_assign_from_schema_keeps_existing_codec() {
        let cancel = CancellationToken::new();
        let mut fields = schema_set().with_entries([FieldValueEntry::new(
            "customfield_7",
            Some(vec!["a".into()]),
            ValueCodec::Reference,
        )]);

        fields
            .assign_from_schema("Tags", None, &CodecRegistry::default(), &cancel)
            .await
            .unwrap();

        assert_eq!(fields.len(), 1);
        let entry = fields.get_by_id("customfield_7").unwrap();
        assert_eq!(entry.codec(), &ValueCodec::Reference);
        assert_eq!(entry.values(), None);
    }

    #[tokio::test]
    async fn test_assign_by_id_codec_resolution() {
        let cancel = CancellationToken::new();
        let registry = CodecRegistry::default();
        let mut fields = schema_set();

        fields
            .assign_by_id("customfield_7", Some(vec!["a".into()]), None, &registry, &cancel)
            .await
            .unwrap()
            .assign_by_id(
                "customfield_8",
                Some(vec!["x".into()]),
                Some(ValueCodec::Reference),
                &registry,
                &cancel,
            )
            .await
            .unwrap()
            .assign_by_id("components", None, None, &registry, &cancel)
            .await
            .unwrap();

        assert_eq!(fields.get_by_id("customfield_7").unwrap().codec(), &ValueCodec::MultiString);
        assert_eq!(fields.get_by_id("customfield_8").unwrap().codec(), &ValueCodec::Reference);
        assert_eq!(fields.get_by_id("components").unwrap().codec(), &ValueCodec::Select);
        assert_eq!(fields.get_by_id("components").unwrap().name(), None);
    }
}
