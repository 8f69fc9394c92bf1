//! Workspace management and issue document storage.

use crate::catalog::FileCatalog;
use crate::config::WorkspaceConfig;
use crate::error::{FsError, Result};
use fieldsync_core::{
    CachedCatalog, CancellationToken, FieldCatalog, FieldResolver, InMemoryCatalog, Issue,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory name for fieldsync data.
const FIELDSYNC_DIR: &str = ".fieldsync";
/// Configuration file name.
const CONFIG_FILE: &str = "config.yml";
/// Catalog file name.
const CATALOG_FILE: &str = "catalog.json";
/// Issues directory name.
const ISSUES_DIR: &str = "issues";

/// An issue as stored on disk: its key and its raw `fields` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueDocument {
    pub key: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl IssueDocument {
    /// Create a document with the given fields.
    #[must_use]
    pub fn new(key: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            key: key.into(),
            fields,
        }
    }
}

/// A workspace holds the field catalog and issue documents on the filesystem.
#[derive(Debug)]
pub struct Workspace {
    /// Root path of the workspace.
    root: PathBuf,
    /// Workspace configuration.
    config: WorkspaceConfig,
}

impl Workspace {
    /// Initialize a new workspace at the given path.
    ///
    /// # Errors
    /// Returns error if workspace already exists or IO fails.
    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let data_dir = root.join(FIELDSYNC_DIR);

        if data_dir.exists() {
            return Err(FsError::WorkspaceExists(root));
        }

        fs::create_dir_all(data_dir.join(ISSUES_DIR))?;

        let config = WorkspaceConfig::default();
        fs::write(data_dir.join(CONFIG_FILE), serde_yaml::to_string(&config)?)?;

        let ws = Self { root, config };
        ws.write_catalog(&InMemoryCatalog::default())?;

        info!(path = %ws.root.display(), "Initialized workspace");

        Ok(ws)
    }

    /// Open an existing workspace at the given path.
    ///
    /// # Errors
    /// Returns error if workspace doesn't exist or config is invalid.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let config_path = root.join(FIELDSYNC_DIR).join(CONFIG_FILE);

        if !config_path.exists() {
            return Err(FsError::WorkspaceNotFound(root));
        }

        let config: WorkspaceConfig = serde_yaml::from_str(&fs::read_to_string(&config_path)?)?;

        debug!(path = %root.display(), "Opened workspace");

        Ok(Self { root, config })
    }

    /// Get the workspace root path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the workspace configuration.
    #[must_use]
    pub const fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    fn data_dir(&self) -> PathBuf {
        self.root.join(FIELDSYNC_DIR)
    }

    fn issue_path(&self, key: &str) -> Result<PathBuf> {
        validate_issue_key(key)?;
        Ok(self.data_dir().join(ISSUES_DIR).join(format!("{key}.json")))
    }

    /// Catalog backed by this workspace's `catalog.json`.
    #[must_use]
    pub fn catalog(&self) -> FileCatalog {
        FileCatalog::new(self.data_dir().join(CATALOG_FILE))
    }

    /// Resolver over a cached view of the workspace catalog.
    #[must_use]
    pub fn resolver(&self) -> FieldResolver<CachedCatalog<FileCatalog>> {
        FieldResolver::new(CachedCatalog::new(self.catalog()))
    }

    /// Replace the catalog file.
    ///
    /// # Errors
    /// Returns error if serialization or IO fails.
    pub fn write_catalog(&self, catalog: &InMemoryCatalog) -> Result<()> {
        let path = self.data_dir().join(CATALOG_FILE);
        fs::write(&path, serde_json::to_string_pretty(catalog)?)?;
        debug!(fields = catalog.fields.len(), "Wrote field catalog");
        Ok(())
    }

    /// Store an issue document, replacing any existing one.
    ///
    /// # Errors
    /// Returns error if the key is invalid or IO fails.
    pub fn put_issue(&self, doc: &IssueDocument) -> Result<()> {
        let path = self.issue_path(&doc.key)?;
        fs::write(&path, serde_json::to_string_pretty(doc)?)?;
        debug!(key = %doc.key, "Stored issue");
        Ok(())
    }

    /// Read an issue document.
    ///
    /// # Errors
    /// Returns error if the issue doesn't exist or the document is invalid.
    pub fn read_issue(&self, key: &str) -> Result<IssueDocument> {
        let path = self.issue_path(key)?;
        if !path.exists() {
            return Err(FsError::IssueNotFound(key.to_string()));
        }
        Ok(serde_json::from_str(&fs::read_to_string(&path)?)?)
    }

    /// List stored issue keys, sorted.
    ///
    /// # Errors
    /// Returns error if the issues directory cannot be read.
    pub fn list_issue_keys(&self) -> Result<Vec<String>> {
        let dir = self.data_dir().join(ISSUES_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem() {
                    keys.push(stem.to_string_lossy().to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Fetch an issue with its remote snapshot.
    ///
    /// # Errors
    /// Returns error if the issue can't be read, the catalog fetch fails or is
    /// cancelled, or a field value can't be decoded.
    pub async fn fetch_issue<C: FieldCatalog>(
        &self,
        key: &str,
        resolver: FieldResolver<C>,
        cancel: &CancellationToken,
    ) -> Result<Issue<C>> {
        let doc = self.read_issue(key)?;
        let registry = self.config.codec_registry();

        let mut issue = Issue::from_remote(&doc.key, &doc.fields, resolver, &registry, cancel).await?;
        issue
            .custom_fields_mut()
            .set_search_by_project_only(self.config.fields.search_by_project_only);

        Ok(issue)
    }

    /// Apply an update payload to a stored issue. Fields absent from the
    /// payload are left untouched.
    ///
    /// # Errors
    /// Returns error if the issue doesn't exist or IO fails.
    pub fn save_issue(&self, key: &str, payload: &Map<String, Value>) -> Result<IssueDocument> {
        let mut doc = self.read_issue(key)?;

        for (id, value) in payload {
            doc.fields.insert(id.clone(), value.clone());
        }
        self.put_issue(&doc)?;

        info!(key = %key, fields = payload.len(), "Saved issue");

        Ok(doc)
    }
}

/// Check a key has the `PROJECT-123` shape.
fn validate_issue_key(key: &str) -> Result<()> {
    let valid = key.split_once('-').is_some_and(|(project, number)| {
        !project.is_empty()
            && project.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !number.is_empty()
            && number.chars().all(|c| c.is_ascii_digit())
    });

    if valid {
        Ok(())
    } else {
        Err(FsError::InvalidIssueKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsync_core::{FieldDefinition, ValueCodec};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Workspace) {
        let tmp = TempDir::new().unwrap();
        let ws = Workspace::init(tmp.path()).unwrap();

        ws.write_catalog(&InMemoryCatalog::new([
            FieldDefinition::new("customfield_1", "Team"),
            FieldDefinition::new("customfield_2", "Region").with_schema_type(
                "com.atlassian.jira.plugin.system.customfieldtypes:cascadingselect",
            ),
        ]))
        .unwrap();

        let fields = json!({
            "project": { "key": "OPS" },
            "issuetype": { "id": "1", "name": "Bug" },
            "summary": "Broken login",
            "customfield_1": [{ "value": "Core" }]
        });
        ws.put_issue(&IssueDocument::new(
            "OPS-1",
            fields.as_object().cloned().unwrap(),
        ))
        .unwrap();

        (tmp, ws)
    }

    #[test]
    fn test_init_workspace() {
        let tmp = TempDir::new().unwrap();
        let ws = Workspace::init(tmp.path()).unwrap();

        assert!(tmp.path().join(".fieldsync/config.yml").exists());
        assert!(tmp.path().join(".fieldsync/catalog.json").exists());
        assert!(tmp.path().join(".fieldsync/issues").exists());
        assert_eq!(ws.config().version, 1);
    }

    #[test]
    fn test_init_existing_fails() {
        let tmp = TempDir::new().unwrap();
        Workspace::init(tmp.path()).unwrap();

        let result = Workspace::init(tmp.path());
        assert!(matches!(result, Err(FsError::WorkspaceExists(_))));
    }

    #[test]
    fn test_open_missing_workspace() {
        let tmp = TempDir::new().unwrap();

        let result = Workspace::open(tmp.path());
        assert!(matches!(result, Err(FsError::WorkspaceNotFound(_))));
    }

    #[test]
    fn test_invalid_issue_key() {
        let (_tmp, ws) = setup();

        assert!(matches!(ws.read_issue("../etc"), Err(FsError::InvalidIssueKey(_))));
        assert!(matches!(ws.read_issue("OPS"), Err(FsError::InvalidIssueKey(_))));
        assert!(matches!(ws.read_issue("OPS-9"), Err(FsError::IssueNotFound(_))));
    }

    #[test]
    fn test_list_issue_keys() {
        let (_tmp, ws) = setup();
        ws.put_issue(&IssueDocument::new("DEV-3", Map::new())).unwrap();

        assert_eq!(ws.list_issue_keys().unwrap(), vec!["DEV-3", "OPS-1"]);
    }

    #[tokio::test]
    async fn test_fetch_edit_save_cycle() {
        let (_tmp, ws) = setup();
        let cancel = CancellationToken::new();

        let mut issue = ws.fetch_issue("OPS-1", ws.resolver(), &cancel).await.unwrap();
        issue
            .custom_fields_mut()
            .add_cascading("Region", "EMEA", Some("Berlin"), &cancel)
            .await
            .unwrap();

        let payload = issue.update_payload().unwrap();
        assert_eq!(payload.len(), 1);

        let doc = ws.save_issue("OPS-1", &payload).unwrap();
        assert_eq!(doc.fields["summary"], json!("Broken login"));
        assert_eq!(doc.fields["customfield_1"], json!([{ "value": "Core" }]));
        assert_eq!(
            doc.fields["customfield_2"],
            json!({ "value": "EMEA", "child": { "value": "Berlin" } })
        );

        let refetched = ws.fetch_issue("OPS-1", ws.resolver(), &cancel).await.unwrap();
        let region = refetched.custom_fields().get_by_id("customfield_2").unwrap();
        assert_eq!(region.codec(), &ValueCodec::Cascading);
        assert!(refetched.changed_fields().is_empty());
    }
}
