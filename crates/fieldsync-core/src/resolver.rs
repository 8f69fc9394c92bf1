//! Field name to field id resolution.
//!
//! Most instances have unique field names, so a single unscoped catalog fetch
//! settles the common case. Only when a name collides (or scoping is forced)
//! is the catalog queried again, narrowed to the issue's project and issue type.

use crate::catalog::{FieldCatalog, FieldIndex};
use crate::definition::{CatalogScope, FieldDefinition, IssueTypeRef};
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Project and issue type an issue belongs to, used to break name ties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueContext {
    /// Project key (e.g., "OPS").
    pub project_key: String,

    /// Issue type id, preferred when scoping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_type_id: Option<String>,

    /// Issue type name, used when the id is unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_type_name: Option<String>,
}

impl IssueContext {
    /// Context for a project with unknown issue type.
    #[must_use]
    pub fn new(project_key: impl Into<String>) -> Self {
        Self {
            project_key: project_key.into(),
            ..Self::default()
        }
    }

    /// Set the issue type id.
    #[must_use]
    pub fn with_issue_type_id(mut self, id: impl Into<String>) -> Self {
        self.issue_type_id = Some(id.into());
        self
    }

    /// Set the issue type name.
    #[must_use]
    pub fn with_issue_type_name(mut self, name: impl Into<String>) -> Self {
        self.issue_type_name = Some(name.into());
        self
    }

    /// Read the context from an issue's `fields` object
    /// (`project.key`, `issuetype.id`, `issuetype.name`).
    #[must_use]
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        let text = |parent: &str, key: &str| {
            fields
                .get(parent)
                .and_then(|p| p.get(key))
                .and_then(Value::as_str)
                .map(String::from)
        };

        Self {
            project_key: text("project", "key").unwrap_or_default(),
            issue_type_id: text("issuetype", "id"),
            issue_type_name: text("issuetype", "name"),
        }
    }

    /// Catalog scope for this context: the issue type id when known,
    /// otherwise its name.
    #[must_use]
    pub fn scope(&self) -> CatalogScope {
        let non_empty = |s: &Option<String>| s.as_deref().filter(|v| !v.is_empty()).map(String::from);

        let issue_type = non_empty(&self.issue_type_id)
            .map(IssueTypeRef::Id)
            .or_else(|| non_empty(&self.issue_type_name).map(IssueTypeRef::Name));

        CatalogScope {
            project_key: self.project_key.clone(),
            issue_type,
        }
    }
}

/// Resolves human field names to remote field ids.
#[derive(Debug)]
pub struct FieldResolver<C> {
    catalog: Arc<C>,
}

impl<C> Clone for FieldResolver<C> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
        }
    }
}

impl<C: FieldCatalog> FieldResolver<C> {
    /// Create a resolver over a catalog.
    #[must_use]
    pub fn new(catalog: C) -> Self {
        Self::shared(Arc::new(catalog))
    }

    /// Create a resolver over a catalog that is shared elsewhere.
    #[must_use]
    pub const fn shared(catalog: Arc<C>) -> Self {
        Self { catalog }
    }

    /// The underlying catalog.
    #[must_use]
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Resolve a field name to its id.
    ///
    /// With `force_scoped`, the scoped query is issued even when the unscoped
    /// catalog has a single match.
    ///
    /// # Errors
    /// - `CoreError::FieldNotFound` when no definition matches
    /// - `CoreError::AmbiguousField` when several still match after scoping
    /// - `CoreError::Cancelled` when `cancel` fires during a catalog fetch
    pub async fn resolve(
        &self,
        name: &str,
        context: &IssueContext,
        force_scoped: bool,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.resolve_definition(name, context, force_scoped, cancel)
            .await
            .map(|def| def.id)
    }

    /// Resolve a field name to its full catalog definition, schema type
    /// included. Same lookup rules as [`Self::resolve`].
    ///
    /// # Errors
    /// Same as [`Self::resolve`].
    pub async fn resolve_definition(
        &self,
        name: &str,
        context: &IssueContext,
        force_scoped: bool,
        cancel: &CancellationToken,
    ) -> Result<FieldDefinition> {
        let unscoped = FieldIndex::new(self.fetch(None, cancel).await?);
        let mut matches: Vec<FieldDefinition> = unscoped.named(name).into_iter().cloned().collect();

        let mut searched_project = None;
        if force_scoped || matches.len() > 1 {
            let scope = context.scope();
            debug!(field = %name, matches = matches.len(), %scope, "Resolving field with scoped catalog");

            let scoped = FieldIndex::new(self.fetch(Some(&scope), cancel).await?);
            matches = scoped.named(name).into_iter().cloned().collect();
            searched_project = Some(scope.project_key);
        }

        if matches.len() > 1 {
            return Err(CoreError::AmbiguousField {
                name: name.to_string(),
                ids: matches.into_iter().map(|d| d.id).collect(),
            });
        }

        match matches.pop() {
            Some(def) => {
                debug!(field = %name, id = %def.id, "Resolved field");
                Ok(def)
            }
            None => Err(CoreError::FieldNotFound {
                name: name.to_string(),
                project: searched_project,
            }),
        }
    }

    /// Look up a catalog definition by id in the unscoped catalog.
    ///
    /// # Errors
    /// Returns `CoreError::Cancelled` on cancellation, or the catalog's error.
    pub async fn definition_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<FieldDefinition>> {
        let index = FieldIndex::new(self.fetch(None, cancel).await?);
        Ok(index.by_id(id).cloned())
    }

    /// Fetch definitions through the catalog, aborting when `cancel` fires.
    ///
    /// # Errors
    /// Returns `CoreError::Cancelled` on cancellation, or the catalog's error.
    pub async fn fetch(
        &self,
        scope: Option<&CatalogScope>,
        cancel: &CancellationToken,
    ) -> Result<Vec<FieldDefinition>> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(CoreError::Cancelled),
            result = self.catalog.fetch(scope) => result,
        }
    }
}
