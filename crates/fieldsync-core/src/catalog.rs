//! Field catalog access.
//!
//! The catalog is the list of custom field definitions the remote service
//! exposes, optionally narrowed to a project and issue type. Fetching it is a
//! network round trip, so [`CachedCatalog`] collapses repeated and concurrent
//! fetches of the same scope into one.

use crate::definition::{CatalogScope, FieldDefinition, IssueTypeRef};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

/// Source of custom field definitions.
///
/// Unscoped fetches return every custom field visible to the caller; scoped
/// fetches return only the fields enabled for that project and issue type.
#[allow(async_fn_in_trait)]
pub trait FieldCatalog {
    /// Fetch field definitions, optionally narrowed to a scope.
    async fn fetch(&self, scope: Option<&CatalogScope>) -> Result<Vec<FieldDefinition>>;
}

impl<C: FieldCatalog + ?Sized> FieldCatalog for Arc<C> {
    async fn fetch(&self, scope: Option<&CatalogScope>) -> Result<Vec<FieldDefinition>> {
        (**self).fetch(scope).await
    }
}

/// Name lookup table over one catalog fetch, keyed by lowercase field name.
#[derive(Debug, Clone, Default)]
pub struct FieldIndex {
    definitions: Vec<FieldDefinition>,
    by_name: HashMap<String, Vec<usize>>,
}

impl FieldIndex {
    /// Build the index from fetched definitions.
    #[must_use]
    pub fn new(definitions: Vec<FieldDefinition>) -> Self {
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, def) in definitions.iter().enumerate() {
            by_name.entry(def.name.to_lowercase()).or_default().push(i);
        }
        Self {
            definitions,
            by_name,
        }
    }

    /// Definitions whose name matches, ignoring case, in catalog order.
    #[must_use]
    pub fn named(&self, name: &str) -> Vec<&FieldDefinition> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|idx| idx.iter().map(|&i| &self.definitions[i]).collect())
            .unwrap_or_default()
    }

    /// Look up a definition by id.
    #[must_use]
    pub fn by_id(&self, id: &str) -> Option<&FieldDefinition> {
        self.definitions.iter().find(|d| d.id == id)
    }
}

/// An issue type known to a catalog, used to translate name scopes to ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueType {
    pub id: String,
    pub name: String,
}

/// A catalog held in memory that filters scoped fetches the way the server does.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InMemoryCatalog {
    /// Issue types, for scopes given by name.
    #[serde(default)]
    pub issue_types: Vec<IssueType>,

    /// Field definitions.
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl InMemoryCatalog {
    /// Create a catalog over the given definitions.
    #[must_use]
    pub fn new(fields: impl IntoIterator<Item = FieldDefinition>) -> Self {
        Self {
            issue_types: Vec::new(),
            fields: fields.into_iter().collect(),
        }
    }

    /// Register an issue type.
    #[must_use]
    pub fn with_issue_type(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.issue_types.push(IssueType {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    /// Filter definitions the way a scoped server query would.
    #[must_use]
    pub fn filter(&self, scope: Option<&CatalogScope>) -> Vec<FieldDefinition> {
        let Some(scope) = scope else {
            return self.fields.clone();
        };

        // An unknown issue type name resolves to an id no restricted field lists,
        // so only unrestricted fields survive.
        let issue_type_id = scope.issue_type.as_ref().map(|it| match it {
            IssueTypeRef::Id(id) => id.clone(),
            IssueTypeRef::Name(name) => self
                .issue_types
                .iter()
                .find(|t| t.name.eq_ignore_ascii_case(name))
                .map(|t| t.id.clone())
                .unwrap_or_default(),
        });

        self.fields
            .iter()
            .filter(|def| def.applies_to(&scope.project_key, issue_type_id.as_deref()))
            .cloned()
            .collect()
    }
}

impl FieldCatalog for InMemoryCatalog {
    async fn fetch(&self, scope: Option<&CatalogScope>) -> Result<Vec<FieldDefinition>> {
        Ok(self.filter(scope))
    }
}

type CacheSlot = Arc<OnceCell<Vec<FieldDefinition>>>;

/// Single-flight cache in front of another catalog, keyed by scope.
///
/// Concurrent fetches of the same scope share one upstream request. Failed
/// fetches are not cached.
#[derive(Debug)]
pub struct CachedCatalog<C> {
    inner: C,
    slots: Mutex<HashMap<Option<CatalogScope>, CacheSlot>>,
}

impl<C> CachedCatalog<C> {
    /// Wrap a catalog.
    #[must_use]
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// The wrapped catalog.
    #[must_use]
    pub const fn inner(&self) -> &C {
        &self.inner
    }

    /// Drop every cached result so the next fetch goes upstream.
    pub async fn invalidate(&self) {
        self.slots.lock().await.clear();
        debug!("Catalog cache invalidated");
    }
}

impl<C: FieldCatalog> FieldCatalog for CachedCatalog<C> {
    async fn fetch(&self, scope: Option<&CatalogScope>) -> Result<Vec<FieldDefinition>> {
        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(scope.cloned()).or_default())
        };

        if let Some(defs) = slot.get() {
            debug!(scope = ?scope, "Catalog cache hit");
            return Ok(defs.clone());
        }

        let defs = slot
            .get_or_try_init(|| async {
                debug!(scope = ?scope, "Catalog cache miss");
                self.inner.fetch(scope).await
            })
            .await?;

        Ok(defs.clone())
    }
}
