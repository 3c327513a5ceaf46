//! Thread types: the stored root, the assembled view, listings and patches

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::ids::{ThreadId, UserId};
use crate::storage::normalize::serialize_opt_time;
use crate::storage::types::{ElementDict, Metadata, StepDict};

/// The stored thread root document (partition key `/id`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadRecord {
    pub id: ThreadId,
    #[serde(default, serialize_with = "serialize_opt_time")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub user_identifier: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// One conversation, reconstructed from its root, steps and elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadDict {
    pub id: ThreadId,
    #[serde(serialize_with = "serialize_opt_time")]
    pub created_at: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub user_id: Option<UserId>,
    pub user_identifier: Option<String>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<Metadata>,
    /// Ordered by `createdAt` ascending
    pub steps: Vec<StepDict>,
    pub elements: Vec<ElementDict>,
}

impl ThreadDict {
    pub(crate) fn assemble(root: ThreadRecord, steps: Vec<StepDict>, elements: Vec<ElementDict>) -> Self {
        Self {
            id: root.id,
            created_at: root.created_at,
            name: root.name,
            user_id: root.user_id,
            user_identifier: root.user_identifier,
            tags: root.tags,
            metadata: root.metadata,
            steps,
            elements,
        }
    }
}

/// A thread as it appears in a listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadSummary {
    pub id: ThreadId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, serialize_with = "serialize_opt_time")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<ThreadRecord> for ThreadSummary {
    fn from(record: ThreadRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            created_at: record.created_at,
        }
    }
}

/// Listing filter: owner, plus an optional case-insensitive name search
#[derive(Debug, Clone)]
pub struct ThreadFilter {
    pub user_id: UserId,
    pub search: Option<String>,
}

impl ThreadFilter {
    pub fn for_user(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            search: None,
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }
}

/// Merge-patch for a thread root. `None` leaves the stored field untouched;
/// `metadata` keys are merged into the stored map, never replacing it.
#[derive(Debug, Clone, Default)]
pub struct ThreadPatch {
    pub name: Option<String>,
    pub user_id: Option<UserId>,
    pub metadata: Option<Metadata>,
    pub tags: Option<Vec<String>>,
}

impl ThreadPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn user_id(mut self, user_id: impl Into<UserId>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }
}
