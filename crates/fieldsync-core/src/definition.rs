//! Custom field definitions as published by the remote catalog.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A custom field known to the remote service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    /// Opaque remote identifier (e.g., "customfield_10010").
    pub id: String,

    /// Human-assigned name. Not unique across the catalog.
    pub name: String,

    /// Schema type used to pick a codec when reading remote values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,

    /// Projects the field is enabled for. Empty means every project.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub applicable_project_keys: BTreeSet<String>,

    /// Issue types the field is enabled for. Empty means every issue type.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub applicable_issue_type_ids: BTreeSet<String>,
}

impl FieldDefinition {
    /// Create a definition that applies everywhere.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            schema_type: None,
            applicable_project_keys: BTreeSet::new(),
            applicable_issue_type_ids: BTreeSet::new(),
        }
    }

    /// Set the schema type.
    #[must_use]
    pub fn with_schema_type(mut self, schema_type: impl Into<String>) -> Self {
        self.schema_type = Some(schema_type.into());
        self
    }

    /// Restrict the definition to the given projects.
    #[must_use]
    pub fn for_projects(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.applicable_project_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict the definition to the given issue types.
    #[must_use]
    pub fn for_issue_types(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.applicable_issue_type_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Check whether the field is enabled for a project and, optionally, an issue type.
    #[must_use]
    pub fn applies_to(&self, project_key: &str, issue_type_id: Option<&str>) -> bool {
        let project_ok = self.applicable_project_keys.is_empty()
            || self
                .applicable_project_keys
                .iter()
                .any(|k| k.eq_ignore_ascii_case(project_key));

        let issue_type_ok = match issue_type_id {
            None => true,
            Some(id) => {
                self.applicable_issue_type_ids.is_empty()
                    || self.applicable_issue_type_ids.contains(id)
            }
        };

        project_ok && issue_type_ok
    }
}

/// How an issue type is identified in a scoped catalog query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueTypeRef {
    /// Issue type id.
    Id(String),
    /// Issue type display name.
    Name(String),
}

/// Narrowing applied to a catalog fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogScope {
    /// Project key the fields must be enabled for.
    pub project_key: String,

    /// Issue type the fields must be enabled for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<IssueTypeRef>,
}

impl CatalogScope {
    /// Scope to a project only.
    #[must_use]
    pub fn project(key: impl Into<String>) -> Self {
        Self {
            project_key: key.into(),
            issue_type: None,
        }
    }

    /// Narrow further to an issue type.
    #[must_use]
    pub fn with_issue_type(mut self, issue_type: IssueTypeRef) -> Self {
        self.issue_type = Some(issue_type);
        self
    }
}

impl std::fmt::Display for CatalogScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "project={}", self.project_key)?;
        match &self.issue_type {
            Some(IssueTypeRef::Id(id)) => write!(f, " issuetype.id={id}"),
            Some(IssueTypeRef::Name(name)) => write!(f, " issuetype.name={name}"),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applies_to_unrestricted() {
        let def = FieldDefinition::new("customfield_1", "Team");

        assert!(def.applies_to("OPS", None));
        assert!(def.applies_to("DEV", Some("10001")));
    }

    #[test]
    fn test_applies_to_restricted() {
        let def = FieldDefinition::new("customfield_1", "Team")
            .for_projects(["OPS"])
            .for_issue_types(["10001"]);

        assert!(def.applies_to("OPS", None));
        assert!(def.applies_to("ops", Some("10001")));
        assert!(!def.applies_to("OPS", Some("10002")));
        assert!(!def.applies_to("DEV", None));
    }

    #[test]
    fn test_definition_json_shape() {
        let def = FieldDefinition::new("customfield_1", "Team").for_projects(["OPS"]);
        let json = serde_json::to_value(&def).unwrap();

        assert_eq!(json["applicableProjectKeys"], serde_json::json!(["OPS"]));
        assert!(json.get("applicableIssueTypeIds").is_none());
    }
}
