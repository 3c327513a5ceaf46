//! Query evaluation shared by the bundled backends
//!
//! Backends load candidate documents (one partition, or all of them) and
//! hand them here for filtering, ordering and bookkeeping.

use serde_json::Value;
use std::cmp::Ordering;
use uuid::Uuid;

use crate::storage::helper::{content_hash, unix_timestamp};
use crate::storage::normalize::{strip_internal, RESERVED_PREFIX};
use crate::storage::traits::{ContainerSpec, Document, Filter, Query, SortOrder};

/// Resolve a dotted path (`metadata.favorite`) inside a document
pub fn field_value<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// The document's partition key, if present and a string
pub fn partition_key_of(doc: &Document, spec: &ContainerSpec) -> Option<String> {
    field_value(doc, &spec.partition_field())
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// The document's `id`, if present and a string
pub fn id_of(doc: &Document) -> Option<String> {
    doc.get("id").and_then(Value::as_str).map(str::to_string)
}

pub fn matches(doc: &Document, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq { field, value } => field_value(doc, field) == Some(value),
        Filter::ContainsIgnoreCase { field, needle } => field_value(doc, field)
            .and_then(Value::as_str)
            .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase())),
    })
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Bool(_)) => 2,
        Some(Value::Number(_)) => 3,
        Some(Value::String(_)) => 4,
        Some(Value::Array(_)) => 5,
        Some(Value::Object(_)) => 6,
    }
}

/// Total order over (possibly missing) JSON values:
/// missing < null < bool < number < string < array < object
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Filter and order candidate documents. The sort is stable, so documents
/// with equal keys keep the backend's iteration order.
pub fn apply_query(candidates: impl IntoIterator<Item = Document>, query: &Query) -> Vec<Document> {
    let mut results: Vec<Document> = candidates
        .into_iter()
        .filter(|doc| matches(doc, &query.filters))
        .collect();

    if let Some(order_by) = &query.order_by {
        results.sort_by(|a, b| {
            let ord = compare_values(field_value(a, &order_by.field), field_value(b, &order_by.field));
            match order_by.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
    }
    results
}

/// Replace the store bookkeeping fields on a document about to be written.
/// `_rid` survives replacement of an existing document.
pub fn stamp_system_fields(doc: &mut Document, previous: Option<&Document>) {
    let body = strip_internal(doc);
    let etag = content_hash(Value::Object(body.clone()).to_string().as_bytes());
    let rid = previous
        .and_then(|p| p.get("_rid").cloned())
        .unwrap_or_else(|| Value::String(Uuid::new_v4().to_string()));

    doc.retain(|key, _| !key.starts_with(RESERVED_PREFIX));
    doc.insert("_rid".into(), rid);
    doc.insert("_etag".into(), Value::String(etag));
    doc.insert("_ts".into(), Value::from(unix_timestamp()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_field_value_follows_dotted_paths() {
        let d = doc(json!({"metadata": {"favorite": true}, "id": "x"}));
        assert_eq!(field_value(&d, "metadata.favorite"), Some(&json!(true)));
        assert_eq!(field_value(&d, "id"), Some(&json!("x")));
        assert_eq!(field_value(&d, "metadata.missing"), None);
        assert_eq!(field_value(&d, "id.deeper"), None);
    }

    #[test]
    fn test_contains_ignore_case() {
        let d = doc(json!({"name": "Quarterly Sales Review"}));
        let hit = Query::cross_partition().contains_ignore_case("name", "sales");
        let miss = Query::cross_partition().contains_ignore_case("name", "budget");
        assert!(matches(&d, &hit.filters));
        assert!(!matches(&d, &miss.filters));
    }

    #[test]
    fn test_apply_query_orders_and_filters() {
        let docs = vec![
            doc(json!({"id": "b", "userId": "u1", "createdAt": "2024-01-02T00:00:00.000000Z"})),
            doc(json!({"id": "a", "userId": "u1", "createdAt": "2024-01-01T00:00:00.000000Z"})),
            doc(json!({"id": "c", "userId": "u2", "createdAt": "2024-01-03T00:00:00.000000Z"})),
            doc(json!({"id": "d", "userId": "u1"})),
        ];
        let query = Query::cross_partition()
            .eq("userId", "u1")
            .order_by("createdAt", SortOrder::Desc);

        let ids: Vec<_> = apply_query(docs, &query)
            .iter()
            .map(|d| id_of(d).unwrap())
            .collect();
        assert_eq!(ids, vec!["b", "a", "d"]);
    }

    #[test]
    fn test_stamp_keeps_rid_and_refreshes_etag() {
        let mut first = doc(json!({"id": "s1", "output": "a"}));
        stamp_system_fields(&mut first, None);
        let rid = first["_rid"].clone();

        let mut second = doc(json!({"id": "s1", "output": "b", "_etag": "stale"}));
        stamp_system_fields(&mut second, Some(&first));

        assert_eq!(second["_rid"], rid);
        assert_ne!(second["_etag"], first["_etag"]);
        assert_ne!(second["_etag"], json!("stale"));
    }
}
