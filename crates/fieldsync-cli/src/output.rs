//! Output formatting for the CLI.

use anyhow::Result;
use fieldsync_core::{FieldDefinition, FieldValueEntry, IssueContext};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Write;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

/// Print output in the specified format.
pub fn print<T: Serialize + HumanDisplay>(value: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Human => println!("{}", value.human_display()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

/// Print a list of catalog fields with dynamic column widths.
pub fn print_field_list(fields: &[FieldSummary], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Human => {
            if fields.is_empty() {
                println!("No fields found.");
                return Ok(());
            }

            let id_width = fields.iter().map(|f| f.id.len()).max().unwrap_or(2).max(2);
            let name_width = fields.iter().map(|f| f.name.len()).max().unwrap_or(4).max(4);

            println!(
                "{:<id_w$}  {:<name_w$}  {}",
                "ID",
                "NAME",
                "PROJECTS",
                id_w = id_width,
                name_w = name_width
            );
            println!("{}", "-".repeat(id_width + name_width + 12));

            for field in fields {
                println!(
                    "{:<id_w$}  {:<name_w$}  {}",
                    field.id,
                    field.name,
                    field.projects_display(),
                    id_w = id_width,
                    name_w = name_width
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(fields)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(fields)?),
    }
    Ok(())
}

/// Print a success message.
pub fn print_success(message: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Human => println!("{message}"),
        OutputFormat::Json => {
            let body = serde_json::json!({ "status": "ok", "message": message });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Yaml => {
            let body = serde_json::json!({ "status": "ok", "message": message });
            println!("{}", serde_yaml::to_string(&body)?);
        }
    }
    Ok(())
}

/// Trait for human-readable display.
pub trait HumanDisplay {
    fn human_display(&self) -> String;
}

/// Catalog field row for `fields` output.
#[derive(Debug, Serialize)]
pub struct FieldSummary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    pub projects: Vec<String>,
}

impl FieldSummary {
    fn projects_display(&self) -> String {
        if self.projects.is_empty() {
            "*".to_string()
        } else {
            self.projects.join(", ")
        }
    }
}

impl From<&FieldDefinition> for FieldSummary {
    fn from(def: &FieldDefinition) -> Self {
        Self {
            id: def.id.clone(),
            name: def.name.clone(),
            schema_type: def.schema_type.clone(),
            projects: def.applicable_project_keys.iter().cloned().collect(),
        }
    }
}

/// Result of `resolve`.
#[derive(Debug, Serialize)]
pub struct ResolvedField {
    pub name: String,
    pub id: String,
}

impl HumanDisplay for ResolvedField {
    fn human_display(&self) -> String {
        format!("{} -> {}", self.name, self.id)
    }
}

/// One custom field value.
#[derive(Debug, Serialize)]
pub struct FieldValueView {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub values: Option<Vec<String>>,
    pub codec: String,
}

impl From<&FieldValueEntry> for FieldValueView {
    fn from(entry: &FieldValueEntry) -> Self {
        Self {
            id: entry.id().to_string(),
            name: entry.name().map(String::from),
            values: entry.values().map(<[String]>::to_vec),
            codec: entry.codec().name().to_string(),
        }
    }
}

/// Custom fields of one issue, for `show`.
#[derive(Debug, Serialize)]
pub struct IssueFieldsView {
    pub key: String,
    pub context: IssueContext,
    pub fields: Vec<FieldValueView>,
}

impl HumanDisplay for IssueFieldsView {
    fn human_display(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "Key:         {}", self.key);
        let _ = writeln!(out, "Project:     {}", self.context.project_key);

        match (&self.context.issue_type_name, &self.context.issue_type_id) {
            (Some(name), Some(id)) => {
                let _ = writeln!(out, "Issue type:  {name} ({id})");
            }
            (Some(label), None) | (None, Some(label)) => {
                let _ = writeln!(out, "Issue type:  {label}");
            }
            (None, None) => {}
        }

        if self.fields.is_empty() {
            let _ = write!(out, "No custom fields set.");
            return out;
        }

        let _ = writeln!(out, "Fields:");
        for field in &self.fields {
            let label = field.name.as_deref().unwrap_or(&field.id);
            let _ = writeln!(
                out,
                "  {label} ({}): {}",
                field.id,
                format_values(field.values.as_deref())
            );
        }

        out
    }
}

/// Outcome of `set`.
#[derive(Debug, Serialize)]
pub struct UpdateResult {
    pub key: String,
    pub payload: Map<String, Value>,
    pub saved: bool,
}

impl HumanDisplay for UpdateResult {
    fn human_display(&self) -> String {
        if self.payload.is_empty() {
            return format!("{}: no changes", self.key);
        }

        let mut out = String::new();
        let verb = if self.saved { "Updated" } else { "Would update" };
        let _ = writeln!(out, "{verb} {} ({} fields):", self.key, self.payload.len());
        for (id, value) in &self.payload {
            let _ = writeln!(out, "  {id} = {value}");
        }
        out
    }
}

fn format_values(values: Option<&[String]>) -> String {
    match values {
        None => "(none)".to_string(),
        Some([]) => "(empty)".to_string(),
        Some(values) => values.join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_issue_view_human_display() {
        let view = IssueFieldsView {
            key: "OPS-1".into(),
            context: IssueContext::new("OPS")
                .with_issue_type_id("1")
                .with_issue_type_name("Bug"),
            fields: vec![
                FieldValueView {
                    id: "customfield_1".into(),
                    name: Some("Team".into()),
                    values: Some(vec!["Core".into(), "Platform".into()]),
                    codec: "select".into(),
                },
                FieldValueView {
                    id: "components".into(),
                    name: None,
                    values: None,
                    codec: "select".into(),
                },
            ],
        };

        let out = view.human_display();
        assert!(out.contains("Issue type:  Bug (1)"));
        assert!(out.contains("Team (customfield_1): Core, Platform"));
        assert!(out.contains("components (components): (none)"));
    }

    #[test]
    fn test_update_result_human_display() {
        let mut payload = Map::new();
        payload.insert("components".into(), json!([]));

        let dry = UpdateResult {
            key: "OPS-1".into(),
            payload,
            saved: false,
        };
        assert!(dry.human_display().starts_with("Would update OPS-1 (1 fields)"));

        let empty = UpdateResult {
            key: "OPS-1".into(),
            payload: Map::new(),
            saved: false,
        };
        assert_eq!(empty.human_display(), "OPS-1: no changes");
    }
}
