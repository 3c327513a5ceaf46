//! Document normalization at the store boundary
//!
//! Every write goes through `normalize_for_write`, every read through
//! `strip_internal`. Stored timestamps share one fixed-width UTC format, so
//! string comparison in the store orders them chronologically.

use chrono::{DateTime, Utc};
use serde::Serializer;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::storage::types::{DocMap, DocValue};

/// Field-name prefix the store reserves for its own bookkeeping
/// (`_rid`, `_etag`, `_ts`, ...)
pub const RESERVED_PREFIX: char = '_';

/// Render a timestamp in the canonical wire format:
/// `YYYY-MM-DDTHH:MM:SS.ffffffZ`
pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Render an in-memory document as stored JSON, turning every temporal
/// value (at any depth) into a canonical timestamp string.
pub fn normalize_for_write(doc: DocMap) -> Map<String, Value> {
    doc.into_iter()
        .map(|(key, value)| (key, normalize_value(value)))
        .collect()
}

fn normalize_value(value: DocValue) -> Value {
    match value {
        DocValue::Null => Value::Null,
        DocValue::Bool(b) => Value::Bool(b),
        DocValue::Number(n) => Value::Number(n),
        DocValue::String(s) => Value::String(s),
        DocValue::Time(t) => Value::String(format_timestamp(&t)),
        DocValue::Array(items) => Value::Array(items.into_iter().map(normalize_value).collect()),
        DocValue::Object(map) => Value::Object(normalize_for_write(map)),
    }
}

/// serde helper: render an optional timestamp in the wire format
pub(crate) fn serialize_opt_time<S: Serializer>(
    t: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match t {
        Some(t) => serializer.serialize_str(&format_timestamp(t)),
        None => serializer.serialize_none(),
    }
}

/// Strip a stored document and decode it into a typed record
pub fn decode_document<T: DeserializeOwned>(doc: &Map<String, Value>) -> serde_json::Result<T> {
    serde_json::from_value(Value::Object(strip_internal(doc)))
}

/// Shallow copy of a stored document without store-internal fields
pub fn strip_internal(doc: &Map<String, Value>) -> Map<String, Value> {
    doc.iter()
        .filter(|(key, _)| !key.starts_with(RESERVED_PREFIX))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
