//! User storage types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::storage::ids::UserId;
use crate::storage::normalize::{decode_document, serialize_opt_time};
use crate::storage::types::{DocMap, DocValue, Metadata};

/// A user as presented by the host at login
#[derive(Debug, Clone, Default)]
pub struct User {
    /// Login identifier; becomes the document id
    pub identifier: String,
    pub display_name: Option<String>,
    pub metadata: Metadata,
}

impl User {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Default::default()
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// The document written on first login. `identifier` is never null:
    /// it is the display name when one is given, else the login identifier.
    pub(crate) fn to_document(&self, created_at: DateTime<Utc>) -> DocMap {
        let identifier = self
            .display_name
            .clone()
            .unwrap_or_else(|| self.identifier.clone());

        let mut doc = DocMap::new();
        doc.insert("id".into(), self.identifier.as_str().into());
        doc.insert("identifier".into(), identifier.into());
        doc.insert("createdAt".into(), DocValue::Time(created_at));
        doc.insert("metadata".into(), DocValue::Object(self.metadata.clone()));
        doc
    }
}

/// A stored user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedUser {
    pub id: UserId,
    pub identifier: String,
    #[serde(default, serialize_with = "serialize_opt_time")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl PersistedUser {
    /// Decode a stored user document, falling back to `id` when the
    /// stored `identifier` is null or missing.
    pub(crate) fn from_document(doc: &Map<String, Value>) -> serde_json::Result<Self> {
        let mut doc = doc.clone();
        let has_identifier = doc.get("identifier").is_some_and(|v| !v.is_null());
        if !has_identifier {
            let id = doc.get("id").cloned().unwrap_or(Value::Null);
            doc.insert("identifier".into(), id);
        }
        if doc.get("metadata").is_some_and(Value::is_null) {
            doc.remove("metadata");
        }
        decode_document(&doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::normalize::normalize_for_write;
    use serde_json::json;

    #[test]
    fn test_identifier_prefers_display_name() {
        let user = User::new("alice@example.com").with_display_name("Alice");
        let doc = user.to_document(Utc::now());
        assert_eq!(doc["id"], DocValue::from("alice@example.com"));
        assert_eq!(doc["identifier"], DocValue::from("Alice"));
    }

    #[test]
    fn test_persisted_user_roundtrip_through_document() {
        let user = User::new("alice");
        let stored = normalize_for_write(user.to_document(Utc::now()));

        let persisted = PersistedUser::from_document(&stored).unwrap();
        assert_eq!(persisted.id.as_str(), "alice");
        assert_eq!(persisted.identifier, "alice");
        assert!(persisted.created_at.is_some());
    }

    #[test]
    fn test_null_identifier_falls_back_to_id() {
        let Value::Object(doc) = json!({"id": "bob", "identifier": null, "_etag": "x"}) else {
            unreachable!()
        };
        let persisted = PersistedUser::from_document(&doc).unwrap();
        assert_eq!(persisted.identifier, "bob");
        assert!(persisted.metadata.is_empty());
    }
}
