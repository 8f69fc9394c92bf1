//! Wire serialization strategies for custom field values.
//!
//! A field's local value is an ordered list of strings, or `None` when the
//! field is cleared. Each codec maps that list to the JSON shape the remote
//! API expects for a family of field schemas:
//!
//! - `Select`: `[{"value": "a"}, {"value": "b"}]`
//! - `MultiString`: `["a", "b"]`
//! - `Cascading`: `{"value": "parent", "child": {"value": "child"}}`
//! - `Reference`: `[{"key": "a"}, {"key": "b"}]`
//!
//! `None` always encodes to `null` and `null` always decodes to `None`.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Extension point for field schemas the built-in codecs do not cover.
pub trait FieldCodec: Send + Sync + fmt::Debug {
    /// Short name used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Convert local values to the wire representation.
    ///
    /// # Errors
    /// Returns `CoreError::Codec` if the values cannot be represented.
    fn encode(&self, field: &str, values: Option<&[String]>) -> Result<Value>;

    /// Convert a wire value back to local values.
    ///
    /// # Errors
    /// Returns `CoreError::Codec` if the wire value has an unexpected shape.
    fn decode(&self, field: &str, wire: &Value) -> Result<Option<Vec<String>>>;
}

/// Serializable name of a built-in codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecKind {
    #[default]
    Select,
    MultiString,
    Cascading,
    Reference,
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "select"),
            Self::MultiString => write!(f, "multi_string"),
            Self::Cascading => write!(f, "cascading"),
            Self::Reference => write!(f, "reference"),
        }
    }
}

/// Codec attached to a field value entry.
#[derive(Debug, Clone, Default)]
pub enum ValueCodec {
    /// Select-list options, each as `{"value": v}`.
    #[default]
    Select,
    /// Plain array of strings.
    MultiString,
    /// Two-level cascading select.
    Cascading,
    /// Object references, each as `{"key": v}`.
    Reference,
    /// Caller-supplied codec.
    Custom(Arc<dyn FieldCodec>),
}

impl PartialEq for ValueCodec {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl From<CodecKind> for ValueCodec {
    fn from(kind: CodecKind) -> Self {
        match kind {
            CodecKind::Select => Self::Select,
            CodecKind::MultiString => Self::MultiString,
            CodecKind::Cascading => Self::Cascading,
            CodecKind::Reference => Self::Reference,
        }
    }
}

impl ValueCodec {
    /// Wrap a custom codec.
    pub fn custom(codec: impl FieldCodec + 'static) -> Self {
        Self::Custom(Arc::new(codec))
    }

    /// Name used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Select => "select",
            Self::MultiString => "multi_string",
            Self::Cascading => "cascading",
            Self::Reference => "reference",
            Self::Custom(codec) => codec.name(),
        }
    }

    /// Encode local values for the wire.
    ///
    /// # Errors
    /// Returns `CoreError::Codec` if the values cannot be represented.
    pub fn encode(&self, field: &str, values: Option<&[String]>) -> Result<Value> {
        let Some(values) = values else {
            return Ok(Value::Null);
        };

        match self {
            Self::Select => Ok(keyed_array("value", values)),
            Self::Reference => Ok(keyed_array("key", values)),
            Self::MultiString => Ok(Value::from(values.to_vec())),
            Self::Cascading => encode_cascading(field, values),
            Self::Custom(codec) => codec.encode(field, Some(values)),
        }
    }

    /// Decode a wire value into local values.
    ///
    /// # Errors
    /// Returns `CoreError::Codec` if the wire value has an unexpected shape.
    pub fn decode(&self, field: &str, wire: &Value) -> Result<Option<Vec<String>>> {
        match self {
            Self::Custom(codec) => codec.decode(field, wire),
            _ if wire.is_null() => Ok(None),
            Self::Select => decode_items(field, wire, &["value", "name", "key", "id"]).map(Some),
            Self::Reference => decode_items(field, wire, &["key", "id", "name", "value"]).map(Some),
            Self::MultiString => decode_items(field, wire, &[]).map(Some),
            Self::Cascading => decode_cascading(field, wire).map(Some),
        }
    }
}

fn keyed_array(key: &str, values: &[String]) -> Value {
    Value::Array(
        values
            .iter()
            .map(|v| Value::Object(Map::from_iter([(key.to_string(), Value::from(v.as_str()))])))
            .collect(),
    )
}

fn encode_cascading(field: &str, values: &[String]) -> Result<Value> {
    match values {
        [] => Ok(Value::Object(Map::new())),
        [parent] => Ok(json!({ "value": parent })),
        [parent, child] => Ok(json!({ "value": parent, "child": { "value": child } })),
        _ => Err(CoreError::codec(
            field,
            format!("cascading select takes at most 2 values, got {}", values.len()),
        )),
    }
}

fn decode_cascading(field: &str, wire: &Value) -> Result<Vec<String>> {
    let Value::Object(obj) = wire else {
        return Err(CoreError::codec(field, "cascading select must be an object"));
    };

    let mut values = Vec::with_capacity(2);
    if let Some(parent) = obj.get("value").filter(|v| !v.is_null()) {
        values.push(scalar_text(field, parent)?);

        if let Some(child) = obj.get("child").and_then(|c| c.get("value")).filter(|v| !v.is_null()) {
            values.push(scalar_text(field, child)?);
        }
    }
    Ok(values)
}

/// Decode an array (or a lone item) into strings, reading objects through the
/// first present key in `keys`.
fn decode_items(field: &str, wire: &Value, keys: &[&str]) -> Result<Vec<String>> {
    match wire {
        Value::Array(items) => items.iter().map(|item| item_text(field, item, keys)).collect(),
        other => Ok(vec![item_text(field, other, keys)?]),
    }
}

fn item_text(field: &str, item: &Value, keys: &[&str]) -> Result<String> {
    match item {
        Value::Object(obj) => keys
            .iter()
            .find_map(|k| obj.get(*k).filter(|v| !v.is_null()))
            .ok_or_else(|| CoreError::codec(field, format!("object item has none of {keys:?}")))
            .and_then(|v| scalar_text(field, v)),
        other => scalar_text(field, other),
    }
}

fn scalar_text(field: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(CoreError::codec(field, format!("unexpected item {other}"))),
    }
}

/// Jira schema types mapped to built-in codecs.
const STANDARD_SCHEMA_CODECS: &[(&str, CodecKind)] = &[
    ("com.atlassian.jira.plugin.system.customfieldtypes:select", CodecKind::Select),
    ("com.atlassian.jira.plugin.system.customfieldtypes:multiselect", CodecKind::Select),
    ("com.atlassian.jira.plugin.system.customfieldtypes:radiobuttons", CodecKind::Select),
    ("com.atlassian.jira.plugin.system.customfieldtypes:multicheckboxes", CodecKind::Select),
    ("com.atlassian.jira.plugin.system.customfieldtypes:cascadingselect", CodecKind::Cascading),
    ("com.atlassian.jira.plugin.system.customfieldtypes:labels", CodecKind::MultiString),
];

/// Maps field schema types to codecs, ignoring case.
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    by_schema: HashMap<String, ValueCodec>,
    fallback: ValueCodec,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for (schema, kind) in STANDARD_SCHEMA_CODECS {
            registry.register(*schema, ValueCodec::from(*kind));
        }
        registry
    }
}

impl CodecRegistry {
    /// A registry with no schema mappings; every field uses the fallback codec.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            by_schema: HashMap::new(),
            fallback: ValueCodec::default(),
        }
    }

    /// Register (or replace) the codec for a schema type.
    pub fn register(&mut self, schema_type: impl AsRef<str>, codec: ValueCodec) -> &mut Self {
        self.by_schema
            .insert(schema_type.as_ref().to_lowercase(), codec);
        self
    }

    /// Codec for a schema type, or the fallback when unknown or absent.
    #[must_use]
    pub fn codec_for(&self, schema_type: Option<&str>) -> ValueCodec {
        schema_type
            .and_then(|s| self.by_schema.get(&s.to_lowercase()))
            .unwrap_or(&self.fallback)
            .clone()
    }
}
