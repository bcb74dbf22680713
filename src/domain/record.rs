//! Flat export records
//!
//! An [`ExportRecord`] is a fixed typed core plus an open, explicitly typed
//! extension map. Converters fill the map; output providers read it.

use super::entity::EntityKind;
use super::ids::{EntityId, StoreId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single typed value in a record or source row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Converts a JSON value into a field value
    ///
    /// Objects have no field representation and are kept as their JSON text.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Int(i),
                None => FieldValue::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => FieldValue::Text(s),
            serde_json::Value::Array(items) => {
                FieldValue::List(items.into_iter().map(FieldValue::from_json).collect())
            }
            obj @ serde_json::Value::Object(_) => FieldValue::Text(obj.to_string()),
        }
    }
}

/// Renders the value as a single flat cell (lists are joined with `|`)
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Int(i) => write!(f, "{i}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str("|")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(i64::from(v))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(v: Vec<T>) -> Self {
        FieldValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// One converted output record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub entity_id: EntityId,
    pub kind: EntityKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<EntityId>,

    pub store_id: StoreId,
    pub language: String,

    /// Open extension fields, ordered by name
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl ExportRecord {
    pub fn new(entity_id: EntityId, kind: EntityKind, store_id: StoreId, language: &str) -> Self {
        Self {
            entity_id,
            kind,
            parent_id: None,
            store_id,
            language: language.to_string(),
            fields: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Names of the typed core columns, in output order
    pub fn core_columns() -> [&'static str; 5] {
        ["entity_id", "kind", "parent_id", "store_id", "language"]
    }

    /// Core column values rendered as flat cells, in [`Self::core_columns`] order
    pub fn core_values(&self) -> [String; 5] {
        [
            self.entity_id.to_string(),
            self.kind.to_string(),
            self.parent_id.map(|p| p.to_string()).unwrap_or_default(),
            self.store_id.to_string(),
            self.language.clone(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_untagged_serde() {
        let value = FieldValue::List(vec![FieldValue::Int(1), FieldValue::Text("a".into())]);
        assert_eq!(serde_json::to_string(&value).unwrap(), "[1,\"a\"]");
        assert_eq!(serde_json::to_string(&FieldValue::Null).unwrap(), "null");
    }

    #[test]
    fn test_field_value_from_json() {
        let json = serde_json::json!({"a": 1});
        assert_eq!(FieldValue::from_json(serde_json::json!(3)), FieldValue::Int(3));
        assert_eq!(
            FieldValue::from_json(serde_json::json!(2.5)),
            FieldValue::Float(2.5)
        );
        assert_eq!(
            FieldValue::from_json(json),
            FieldValue::Text("{\"a\":1}".into())
        );
    }

    #[test]
    fn test_field_value_display() {
        let list: FieldValue = vec!["red", "blue"].into();
        assert_eq!(list.to_string(), "red|blue");
        assert_eq!(FieldValue::Null.to_string(), "");
        assert_eq!(FieldValue::from(Some(4i64)).to_string(), "4");
    }

    #[test]
    fn test_export_record_core_values() {
        let mut record = ExportRecord::new(
            EntityId::new(10),
            EntityKind::Product,
            StoreId::new(1),
            "de",
        );
        record.parent_id = Some(EntityId::new(3));
        record.set("sku", "A-1");

        assert_eq!(record.core_values(), ["10", "product", "3", "1", "de"].map(String::from));
        assert_eq!(record.get("sku").and_then(FieldValue::as_text), Some("A-1"));
    }
}
