// Documents and reference values

use crate::error::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A catalog document: a JSON object identified by its `id` field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Document(Map::new())
    }

    /// Build a document from a JSON value, which must be an object
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Document(map)),
            other => Err(CatalogError::Validation(format!(
                "document must be a JSON object, got {}",
                type_name(&other)
            ))),
        }
    }

    /// The document's `id`, if it holds a string
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.0.insert("id".into(), Value::String(id.into()));
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Overlay the fields of `partial` onto this document. Top-level fields
    /// are replaced wholesale; nested objects are not merged.
    pub fn merge(&mut self, partial: Document) {
        for (field, value) in partial.0 {
            self.0.insert(field, value);
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Document(map)
    }
}

/// The runtime value of a declared reference field, decided once from the
/// stored JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceValue {
    None,
    Single(String),
    Many(Vec<String>),
}

impl ReferenceValue {
    /// Classify the value of reference field `field`. Missing, null, empty
    /// string and empty list are `None`; any value that is not a string ID
    /// or a list of string IDs is an `InvalidReferenceShape` error.
    pub fn parse(field: &str, value: Option<&Value>) -> Result<Self> {
        match value {
            None | Some(Value::Null) => Ok(ReferenceValue::None),
            Some(Value::String(id)) if id.is_empty() => Ok(ReferenceValue::None),
            Some(Value::String(id)) => Ok(ReferenceValue::Single(id.clone())),
            Some(Value::Array(items)) if items.is_empty() => Ok(ReferenceValue::None),
            Some(Value::Array(items)) => {
                let mut ids = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(id) => ids.push(id.clone()),
                        other => {
                            return Err(CatalogError::InvalidReferenceShape {
                                field: field.to_string(),
                                found: format!("a list containing {}", type_name(other)),
                            })
                        }
                    }
                }
                Ok(ReferenceValue::Many(ids))
            }
            Some(other) => Err(CatalogError::InvalidReferenceShape {
                field: field.to_string(),
                found: type_name(other).to_string(),
            }),
        }
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_from_value() {
        let doc = Document::from_value(json!({"id": "STU:0000001", "title": "T"})).unwrap();
        assert_eq!(doc.id(), Some("STU:0000001"));
        assert_eq!(doc.get("title"), Some(&json!("T")));

        let err = Document::from_value(json!(["not", "an", "object"])).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
    }

    #[test]
    fn test_non_string_id_is_not_an_id() {
        let doc = Document::from_value(json!({"id": 7})).unwrap();
        assert_eq!(doc.id(), None);
    }

    #[test]
    fn test_merge_is_shallow() {
        let mut doc = Document::from_value(json!({
            "id": "DAT:0000001",
            "title": "Old",
            "extra": {"a": 1, "b": 2}
        }))
        .unwrap();
        let partial = Document::from_value(json!({"title": "New", "extra": {"a": 3}})).unwrap();
        doc.merge(partial);

        assert_eq!(
            doc.into_value(),
            json!({"id": "DAT:0000001", "title": "New", "extra": {"a": 3}})
        );
    }

    #[test]
    fn test_reference_value_shapes() {
        assert_eq!(ReferenceValue::parse("f", None).unwrap(), ReferenceValue::None);
        assert_eq!(ReferenceValue::parse("f", Some(&json!(null))).unwrap(), ReferenceValue::None);
        assert_eq!(ReferenceValue::parse("f", Some(&json!(""))).unwrap(), ReferenceValue::None);
        assert_eq!(ReferenceValue::parse("f", Some(&json!([]))).unwrap(), ReferenceValue::None);
        assert_eq!(
            ReferenceValue::parse("f", Some(&json!("EXP:1"))).unwrap(),
            ReferenceValue::Single("EXP:1".into())
        );
        assert_eq!(
            ReferenceValue::parse("f", Some(&json!(["A", "B"]))).unwrap(),
            ReferenceValue::Many(vec!["A".into(), "B".into()])
        );
    }

    #[test]
    fn test_reference_value_rejects_bad_shapes() {
        for bad in [json!(12345), json!(true), json!({"id": "X"}), json!(["A", 2])] {
            let err = ReferenceValue::parse("has_experiment", Some(&bad)).unwrap_err();
            match err {
                CatalogError::InvalidReferenceShape { field, .. } => {
                    assert_eq!(field, "has_experiment")
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }
}
