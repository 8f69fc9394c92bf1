//! Error types for fieldsync-core.

use thiserror::Error;

/// Result type alias for fieldsync-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while resolving, encoding or diffing custom fields.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No catalog entry matched the field name.
    #[error("could not find custom field with name '{name}' on the server{}", scope_hint(.project.as_deref()))]
    FieldNotFound {
        name: String,
        /// Project key the search was narrowed to, if any.
        project: Option<String>,
    },

    /// Several catalog entries still match after scoping.
    #[error("custom field name '{name}' is ambiguous, matching ids: {}", .ids.join(", "))]
    AmbiguousField { name: String, ids: Vec<String> },

    /// A wire value could not be encoded or decoded.
    #[error("cannot convert value of field '{field}': {reason}")]
    Codec { field: String, reason: String },

    /// The operation was aborted through its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// The catalog collaborator failed.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Build a codec error for the given field.
    pub fn codec(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Codec {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

fn scope_hint(project: Option<&str>) -> String {
    project.map_or_else(String::new, |key| {
        format!(
            ". The field was only searched for in the project with key '{key}'. \
             Make sure the custom field is available in the issue create screen for that project"
        )
    })
}
