//! CLI command implementations.

use crate::output::{
    self, FieldSummary, FieldValueView, IssueFieldsView, OutputFormat, ResolvedField,
    UpdateResult,
};
use anyhow::{bail, Context, Result};
use console::style;
use fieldsync_core::{
    CancellationToken, CodecRegistry, FieldCatalog, FieldValueSet, IssueContext, ValueCodec,
};
use fieldsync_fs::Workspace;
use std::collections::HashMap;
use std::path::Path;

/// Initialize a new workspace.
pub fn init(path: &Path, format: OutputFormat) -> Result<()> {
    Workspace::init(path).context("Failed to initialize workspace")?;
    output::print_success(
        &format!("Initialized workspace at {}", path.display()),
        format,
    )
}

/// List catalog fields.
pub async fn fields(
    path: &Path,
    project: Option<String>,
    issue_type: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let ws = Workspace::open(path).context("Failed to open workspace")?;

    let scope = project.map(|project| issue_context(project, issue_type).scope());
    let definitions = ws
        .catalog()
        .fetch(scope.as_ref())
        .await
        .context("Failed to read field catalog")?;

    let summaries: Vec<FieldSummary> = definitions.iter().map(FieldSummary::from).collect();
    output::print_field_list(&summaries, format)
}

/// Resolve a field name to its id.
pub async fn resolve(
    path: &Path,
    name: &str,
    project: String,
    issue_type: Option<String>,
    project_only: bool,
    format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<()> {
    let ws = Workspace::open(path).context("Failed to open workspace")?;
    let context = issue_context(project, issue_type);
    let force_scoped = project_only || ws.config().fields.search_by_project_only;

    let id = ws
        .resolver()
        .resolve(name, &context, force_scoped, cancel)
        .await?;

    output::print(
        &ResolvedField {
            name: name.to_string(),
            id,
        },
        format,
    )
}

/// Show the custom fields of an issue.
pub async fn show(
    path: &Path,
    key: &str,
    format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<()> {
    let ws = Workspace::open(path).context("Failed to open workspace")?;
    let issue = ws
        .fetch_issue(key, ws.resolver(), cancel)
        .await
        .with_context(|| format!("Failed to load {key}"))?;

    let view = IssueFieldsView {
        key: key.to_string(),
        context: issue.context().clone(),
        fields: issue
            .custom_fields()
            .iter()
            .map(FieldValueView::from)
            .collect(),
    };
    output::print(&view, format)
}

/// Apply field edits to an issue and save the changed fields.
pub async fn set(
    path: &Path,
    key: &str,
    edits: &FieldEdits,
    dry_run: bool,
    format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<()> {
    if edits.is_empty() {
        bail!("Nothing to set: pass --field, --cascade or --clear");
    }

    let ws = Workspace::open(path).context("Failed to open workspace")?;
    let mut issue = ws
        .fetch_issue(key, ws.resolver(), cancel)
        .await
        .with_context(|| format!("Failed to load {key}"))?;

    let registry = ws.config().codec_registry();
    edits.apply(issue.custom_fields_mut(), &registry, cancel).await?;

    let payload = issue.update_payload().context("Failed to build update")?;
    let saved = !dry_run && !payload.is_empty();
    if saved {
        ws.save_issue(key, &payload)
            .with_context(|| format!("Failed to save {key}"))?;
    } else if dry_run && matches!(format, OutputFormat::Human) {
        println!("{}", style("  Dry run, nothing saved.").dim());
    }

    output::print(
        &UpdateResult {
            key: key.to_string(),
            payload,
            saved,
        },
        format,
    )
}

/// Start the tool server and run until interrupted.
pub async fn tool_serve(
    path: &Path,
    host: Option<String>,
    port: Option<u16>,
    cancel: &CancellationToken,
) -> Result<()> {
    let ws = Workspace::open(path).context("Failed to open workspace")?;
    let host = host.unwrap_or_else(|| ws.config().server.host.clone());
    let port = port.unwrap_or(ws.config().server.port);

    fieldsync_toolserver::serve(ws.root(), &host, port, cancel.clone()).await
}

/// Scope from a project and an issue type given as either id or name.
fn issue_context(project: String, issue_type: Option<String>) -> IssueContext {
    let context = IssueContext::new(project);
    match issue_type {
        Some(t) if !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()) => {
            context.with_issue_type_id(t)
        }
        Some(t) => context.with_issue_type_name(t),
        None => context,
    }
}

/// A single edit requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEdit {
    Set { name: String, values: Vec<String> },
    Cascade {
        name: String,
        parent: String,
        child: Option<String>,
    },
    Clear { name: String },
}

impl FieldEdit {
    fn name(&self) -> &str {
        match self {
            Self::Set { name, .. } | Self::Cascade { name, .. } | Self::Clear { name } => name,
        }
    }

    const fn flag(&self) -> &'static str {
        match self {
            Self::Set { .. } => "--field",
            Self::Cascade { .. } => "--cascade",
            Self::Clear { .. } => "--clear",
        }
    }
}

/// Edits to apply to an issue. A field takes edits of one kind only, so the
/// outcome never depends on how the flags were ordered.
#[derive(Debug, Default)]
pub struct FieldEdits(Vec<FieldEdit>);

impl FieldEdits {
    /// Parse `NAME=V1,V2`, `NAME=PARENT[/CHILD]` and bare `NAME` arguments.
    pub fn parse(fields: &[String], cascades: &[String], clears: &[String]) -> Result<Self> {
        let mut edits = Vec::new();

        for arg in fields {
            let (name, rest) = split_assignment(arg)?;
            let values = rest
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
                .collect();
            edits.push(FieldEdit::Set { name, values });
        }

        for arg in cascades {
            let (name, rest) = split_assignment(arg)?;
            let (parent, child) = match rest.split_once('/') {
                Some((parent, child)) => (parent.trim(), Some(child.trim())),
                None => (rest.trim(), None),
            };
            if parent.is_empty() {
                bail!("Cascading value for '{name}' needs a parent option");
            }
            edits.push(FieldEdit::Cascade {
                name,
                parent: parent.to_string(),
                child: child.filter(|c| !c.is_empty()).map(String::from),
            });
        }

        for name in clears {
            let name = name.trim();
            if name.is_empty() {
                bail!("--clear needs a field name");
            }
            edits.push(FieldEdit::Clear {
                name: name.to_string(),
            });
        }

        let mut kinds: HashMap<String, &FieldEdit> = HashMap::new();
        for edit in &edits {
            let first = *kinds.entry(edit.name().to_lowercase()).or_insert(edit);
            if first.flag() != edit.flag() {
                bail!(
                    "Field '{}' is edited with both {} and {}",
                    edit.name(),
                    first.flag(),
                    edit.flag()
                );
            }
        }

        Ok(Self(edits))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Apply every edit, resolving names against the issue's context. Fields
    /// without an entry yet get the codec `registry` picks for their schema.
    pub async fn apply<C: FieldCatalog>(
        &self,
        fields: &mut FieldValueSet<C>,
        registry: &CodecRegistry,
        cancel: &CancellationToken,
    ) -> Result<()> {
        for edit in &self.0 {
            match edit {
                FieldEdit::Set { name, values } => {
                    fields
                        .assign_from_schema(name, Some(values.clone()), registry, cancel)
                        .await?;
                }
                FieldEdit::Cascade {
                    name,
                    parent,
                    child,
                } => {
                    let values = std::iter::once(parent.clone()).chain(child.clone()).collect();
                    fields
                        .assign(name, Some(values), ValueCodec::Cascading, cancel)
                        .await?;
                }
                FieldEdit::Clear { name } => {
                    fields.assign_from_schema(name, None, registry, cancel).await?;
                }
            }
        }
        Ok(())
    }
}

fn split_assignment(arg: &str) -> Result<(String, &str)> {
    let Some((name, rest)) = arg.split_once('=') else {
        bail!("Invalid assignment '{arg}', expected NAME=VALUE");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid assignment '{arg}', field name is empty");
    }
    Ok((name.to_string(), rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsync_core::{FieldDefinition, FieldResolver, InMemoryCatalog};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_parse_edits() {
        let edits = FieldEdits::parse(
            &strings(&["Team = Core, Platform", "Labels="]),
            &strings(&["Region=EMEA/Berlin", "Zone=APAC"]),
            &strings(&["Sprint"]),
        )
        .unwrap();

        assert_eq!(
            edits.0,
            vec![
                FieldEdit::Set {
                    name: "Team".into(),
                    values: strings(&["Core", "Platform"]),
                },
                FieldEdit::Set {
                    name: "Labels".into(),
                    values: vec![],
                },
                FieldEdit::Cascade {
                    name: "Region".into(),
                    parent: "EMEA".into(),
                    child: Some("Berlin".into()),
                },
                FieldEdit::Cascade {
                    name: "Zone".into(),
                    parent: "APAC".into(),
                    child: None,
                },
                FieldEdit::Clear {
                    name: "Sprint".into(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(FieldEdits::parse(&strings(&["Team"]), &[], &[]).is_err());
        assert!(FieldEdits::parse(&strings(&["=Core"]), &[], &[]).is_err());
        assert!(FieldEdits::parse(&[], &strings(&["Region=/Berlin"]), &[]).is_err());
        assert!(FieldEdits::parse(&[], &[], &strings(&[" "])).is_err());
    }

    #[test]
    fn test_parse_rejects_mixed_edits_on_one_field() {
        let err = FieldEdits::parse(&strings(&["Team=Core"]), &[], &strings(&["team"])).unwrap_err();
        assert!(err.to_string().contains("--field and --clear"));

        assert!(FieldEdits::parse(&[], &strings(&["Region=EMEA"]), &strings(&["Region"])).is_err());

        let repeated = FieldEdits::parse(&strings(&["Team=A", "Team=B"]), &[], &[]).unwrap();
        assert_eq!(repeated.0.len(), 2);
    }

    #[test]
    fn test_issue_context_from_issue_type() {
        let by_id = issue_context("OPS".into(), Some("10001".into()));
        assert_eq!(by_id.issue_type_id.as_deref(), Some("10001"));

        let by_name = issue_context("OPS".into(), Some("Bug".into()));
        assert_eq!(by_name.issue_type_name.as_deref(), Some("Bug"));
        assert_eq!(by_name.issue_type_id, None);
    }

    #[tokio::test]
    async fn test_apply_edits_builds_payload() {
        let catalog = InMemoryCatalog::new([
            FieldDefinition::new("customfield_1", "Team"),
            FieldDefinition::new("customfield_2", "Region"),
            FieldDefinition::new("customfield_3", "Sprint"),
        ]);
        let mut set = FieldValueSet::new(FieldResolver::new(catalog), IssueContext::new("OPS"));
        let cancel = CancellationToken::new();

        let edits = FieldEdits::parse(
            &strings(&["Team=Core"]),
            &strings(&["Region=EMEA/Berlin"]),
            &strings(&["Sprint"]),
        )
        .unwrap();
        edits
            .apply(&mut set, &CodecRegistry::default(), &cancel)
            .await
            .unwrap();

        let payload = fieldsync_core::build_update_payload(set.iter()).unwrap();
        assert_eq!(
            serde_json::Value::Object(payload),
            json!({
                "customfield_1": [{ "value": "Core" }],
                "customfield_2": { "value": "EMEA", "child": { "value": "Berlin" } },
                "customfield_3": null
            })
        );
    }

    #[tokio::test]
    async fn test_set_new_field_uses_schema_codec() {
        let catalog = InMemoryCatalog::new([FieldDefinition::new("customfield_7", "Tags")
            .with_schema_type("com.atlassian.jira.plugin.system.customfieldtypes:labels")]);
        let mut set = FieldValueSet::new(FieldResolver::new(catalog), IssueContext::new("OPS"));
        let cancel = CancellationToken::new();

        FieldEdits::parse(&strings(&["Tags=a,b"]), &[], &[])
            .unwrap()
            .apply(&mut set, &CodecRegistry::default(), &cancel)
            .await
            .unwrap();

        let payload = fieldsync_core::build_update_payload(set.iter()).unwrap();
        assert_eq!(
            serde_json::Value::Object(payload),
            json!({ "customfield_7": ["a", "b"] })
        );
    }
}
