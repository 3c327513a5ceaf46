//! In-memory document values
//!
//! `DocValue` is JSON plus a temporal variant. Documents are assembled as
//! `DocMap`s on the write path and rendered to wire JSON by the normalizer,
//! which is the only place a `Time` becomes text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

use crate::storage::normalize::format_timestamp;

/// String-keyed open map (metadata, element props, unknown fields)
pub type DocMap = BTreeMap<String, DocValue>;

/// Free-form metadata attached to users and threads
pub type Metadata = DocMap;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum DocValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Time(DateTime<Utc>),
    Array(Vec<DocValue>),
    Object(DocMap),
}

impl DocValue {
    pub fn as_object(&self) -> Option<&DocMap> {
        match self {
            DocValue::Object(map) => Some(map),
            _ => None,
        }
    }
}

impl From<Value> for DocValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => DocValue::Null,
            Value::Bool(b) => DocValue::Bool(b),
            Value::Number(n) => DocValue::Number(n),
            Value::String(s) => DocValue::String(s),
            Value::Array(items) => DocValue::Array(items.into_iter().map(DocValue::from).collect()),
            Value::Object(map) => DocValue::Object(doc_map_from_json(map)),
        }
    }
}

/// Lift a stored JSON object into a `DocMap`
pub fn doc_map_from_json(map: Map<String, Value>) -> DocMap {
    map.into_iter().map(|(k, v)| (k, DocValue::from(v))).collect()
}

impl From<DateTime<Utc>> for DocValue {
    fn from(t: DateTime<Utc>) -> Self {
        DocValue::Time(t)
    }
}

impl From<String> for DocValue {
    fn from(s: String) -> Self {
        DocValue::String(s)
    }
}

impl From<&str> for DocValue {
    fn from(s: &str) -> Self {
        DocValue::String(s.to_string())
    }
}

impl From<bool> for DocValue {
    fn from(b: bool) -> Self {
        DocValue::Bool(b)
    }
}

impl From<i64> for DocValue {
    fn from(n: i64) -> Self {
        DocValue::Number(n.into())
    }
}

impl From<DocMap> for DocValue {
    fn from(map: DocMap) -> Self {
        DocValue::Object(map)
    }
}

impl<T: Into<DocValue>> From<Vec<T>> for DocValue {
    fn from(items: Vec<T>) -> Self {
        DocValue::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<DocValue>> From<Option<T>> for DocValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(DocValue::Null)
    }
}

impl Serialize for DocValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DocValue::Null => serializer.serialize_unit(),
            DocValue::Bool(b) => serializer.serialize_bool(*b),
            DocValue::Number(n) => n.serialize(serializer),
            DocValue::String(s) => serializer.serialize_str(s),
            DocValue::Time(t) => serializer.serialize_str(&format_timestamp(t)),
            DocValue::Array(items) => items.serialize(serializer),
            DocValue::Object(map) => map.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_from_json_roundtrips_structure() {
        let value = DocValue::from(json!({"a": [1, "x", null], "b": {"c": true}}));
        let map = value.as_object().unwrap();
        assert_eq!(
            map["a"],
            DocValue::Array(vec![DocValue::from(1i64), DocValue::from("x"), DocValue::Null])
        );
        assert_eq!(map["b"].as_object().unwrap()["c"], DocValue::Bool(true));
    }

    #[test]
    fn test_time_serializes_as_wire_timestamp() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let json = serde_json::to_value(DocValue::Time(t)).unwrap();
        assert_eq!(json, json!("2024-03-01T12:30:00.000000Z"));
    }

    #[test]
    fn test_deserialize_metadata_map() {
        let meta: Metadata = serde_json::from_value(json!({"lang": "en", "n": 3})).unwrap();
        assert_eq!(meta["lang"], DocValue::from("en"));
        assert_eq!(meta["n"], DocValue::from(3i64));
    }
}
