//! A single custom field value attached to an issue.

use crate::codec::ValueCodec;
use crate::error::{CoreError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Name of the system field that rejects `null` on update.
pub const COMPONENTS_FIELD: &str = "components";

/// One field value: remote id, optional display name, values and codec.
///
/// `values == None` means the field is intentionally cleared, which is not
/// the same as an empty list.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValueEntry {
    id: String,
    name: Option<String>,
    values: Option<Vec<String>>,
    codec: ValueCodec,
    raw: Option<Value>,
}

impl FieldValueEntry {
    /// Create an entry for a known field id.
    #[must_use]
    pub fn new(id: impl Into<String>, values: Option<Vec<String>>, codec: ValueCodec) -> Self {
        Self {
            id: id.into(),
            name: None,
            values,
            codec,
            raw: None,
        }
    }

    /// Attach the human field name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach the wire value the entry was read from.
    #[must_use]
    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Remote field id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human field name, when the entry was added by name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Current values, or `None` when cleared.
    #[must_use]
    pub fn values(&self) -> Option<&[String]> {
        self.values.as_deref()
    }

    /// Codec used to put this entry on the wire.
    #[must_use]
    pub const fn codec(&self) -> &ValueCodec {
        &self.codec
    }

    /// Replace the values. Any raw wire value read earlier is discarded.
    pub fn set_values(&mut self, values: Option<Vec<String>>) {
        self.values = values;
        self.raw = None;
    }

    /// Whether this entry targets the "components" field.
    #[must_use]
    pub fn is_components(&self) -> bool {
        self.id.eq_ignore_ascii_case(COMPONENTS_FIELD)
            || self
                .name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(COMPONENTS_FIELD))
    }

    /// Encode the values with the entry's codec.
    ///
    /// # Errors
    /// Returns `CoreError::Codec` if the codec rejects the values.
    pub fn encode(&self) -> Result<Value> {
        self.codec.encode(self.label(), self.values())
    }

    /// Wire form of the entry: the value as read from the server when it has
    /// not been edited since, otherwise the encoded values.
    ///
    /// # Errors
    /// Returns `CoreError::Codec` if encoding fails.
    pub fn raw_value(&self) -> Result<Value> {
        match &self.raw {
            Some(raw) => Ok(raw.clone()),
            None => self.encode(),
        }
    }

    /// Deserialize the wire form as `T`, or `T::default()` when it is empty.
    ///
    /// # Errors
    /// Returns `CoreError::Codec` if the wire form does not fit `T`.
    pub fn decode_as<T: DeserializeOwned + Default>(&self) -> Result<T> {
        let raw = self.raw_value()?;
        if is_empty_wire(&raw) {
            return Ok(T::default());
        }
        serde_json::from_value(raw).map_err(|e| CoreError::codec(self.label(), e.to_string()))
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

fn is_empty_wire(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct SelectOption {
        value: String,
    }

    #[test]
    fn test_decode_as_prefers_raw() {
        let entry = FieldValueEntry::new("customfield_1", Some(vec!["3".into()]), ValueCodec::Select)
            .with_raw(json!(3.0));

        let points: f64 = entry.decode_as().unwrap();
        assert!((points - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_decode_as_encodes_local_values() {
        let entry = FieldValueEntry::new(
            "customfield_1",
            Some(vec!["A".into(), "B".into()]),
            ValueCodec::Select,
        );

        let options: Vec<SelectOption> = entry.decode_as().unwrap();
        assert_eq!(
            options,
            vec![
                SelectOption { value: "A".into() },
                SelectOption { value: "B".into() }
            ]
        );
    }

    #[test]
    fn test_decode_as_empty_is_default() {
        let cleared = FieldValueEntry::new("customfield_1", None, ValueCodec::Select);
        let empty = FieldValueEntry::new("customfield_1", Some(vec![]), ValueCodec::Select);

        assert_eq!(cleared.decode_as::<Vec<SelectOption>>().unwrap(), vec![]);
        assert_eq!(empty.decode_as::<String>().unwrap(), String::new());
    }

    #[test]
    fn test_decode_as_type_mismatch() {
        let entry = FieldValueEntry::new("customfield_1", None, ValueCodec::Select)
            .with_name("Team")
            .with_raw(json!({ "value": "A" }));

        let err = entry.decode_as::<u32>().unwrap_err();
        assert!(matches!(err, CoreError::Codec { ref field, .. } if field == "Team"));
    }

    #[test]
    fn test_set_values_drops_raw() {
        let mut entry = FieldValueEntry::new("customfield_1", Some(vec!["A".into()]), ValueCodec::Select)
            .with_raw(json!({ "value": "A", "id": "1" }));

        entry.set_values(Some(vec!["B".into()]));
        assert_eq!(entry.raw_value().unwrap(), json!([{ "value": "B" }]));
    }

    #[test]
    fn test_is_components() {
        let by_id = FieldValueEntry::new("components", None, ValueCodec::Select);
        let by_name = FieldValueEntry::new("x", None, ValueCodec::Select).with_name("Components");
        let other = FieldValueEntry::new("customfield_1", None, ValueCodec::Select);

        assert!(by_id.is_components());
        assert!(by_name.is_components());
        assert!(!other.is_components());
    }
}
