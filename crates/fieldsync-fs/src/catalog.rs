//! Field catalog read from `catalog.json`.

use fieldsync_core::{CatalogScope, CoreError, FieldCatalog, FieldDefinition, InMemoryCatalog};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Catalog backed by a JSON file, re-read on every fetch.
///
/// Scoped fetches are filtered the way the server filters create metadata.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    /// Catalog stored at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the catalog file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the whole catalog document.
    ///
    /// # Errors
    /// Returns `CoreError::Catalog` if the file cannot be read, or
    /// `CoreError::Json` if it is malformed.
    pub async fn load(&self) -> fieldsync_core::Result<InMemoryCatalog> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| CoreError::Catalog(format!("{}: {e}", self.path.display())))?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl FieldCatalog for FileCatalog {
    async fn fetch(
        &self,
        scope: Option<&CatalogScope>,
    ) -> fieldsync_core::Result<Vec<FieldDefinition>> {
        let catalog = self.load().await?;
        let fields = catalog.filter(scope);
        debug!(path = %self.path.display(), scope = ?scope, count = fields.len(), "Read field catalog");
        Ok(fields)
    }
}
