//! Step and feedback types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::ids::{StepId, ThreadId};
use crate::storage::normalize::serialize_opt_time;
use crate::storage::types::{DocMap, DocValue, Metadata};

/// One persisted turn or sub-action of a thread.
///
/// Partitioned by `threadId`; ordered within the thread by `createdAt`.
/// Fields the adapter does not interpret are carried in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDict {
    pub id: StepId,
    pub thread_id: ThreadId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<StepId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub step_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// User-visible content of the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, serialize_with = "serialize_opt_time", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, serialize_with = "serialize_opt_time", skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, serialize_with = "serialize_opt_time", skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    #[serde(flatten)]
    pub extra: DocMap,
}

impl StepDict {
    pub fn new(id: impl Into<StepId>, thread_id: impl Into<ThreadId>, step_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            thread_id: thread_id.into(),
            parent_id: None,
            name: None,
            step_type: step_type.into(),
            input: None,
            output: None,
            is_error: None,
            streaming: None,
            metadata: None,
            tags: None,
            created_at: None,
            start: None,
            end: None,
            feedback: None,
            extra: DocMap::new(),
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<StepId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub(crate) fn to_document(&self) -> DocMap {
        let mut doc = self.extra.clone();
        doc.insert("id".into(), self.id.as_str().into());
        doc.insert("threadId".into(), self.thread_id.as_str().into());
        doc.insert("type".into(), self.step_type.as_str().into());

        let optional: [(&str, Option<DocValue>); 12] = [
            ("parentId", self.parent_id.as_ref().map(|p| p.as_str().into())),
            ("name", self.name.clone().map(DocValue::from)),
            ("input", self.input.clone().map(DocValue::from)),
            ("output", self.output.clone().map(DocValue::from)),
            ("isError", self.is_error.map(DocValue::from)),
            ("streaming", self.streaming.map(DocValue::from)),
            ("metadata", self.metadata.clone().map(DocValue::Object)),
            ("tags", self.tags.clone().map(DocValue::from)),
            ("createdAt", self.created_at.map(DocValue::Time)),
            ("start", self.start.map(DocValue::Time)),
            ("end", self.end.map(DocValue::Time)),
            ("feedback", self.feedback.as_ref().map(|f| DocValue::Object(f.to_document()))),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                doc.insert(key.into(), value);
            }
        }
        doc
    }
}

/// A rating attached to the step that answers `for_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    /// Composite `<threadId>::<forId>`, assigned on upsert
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub for_id: StepId,
    pub thread_id: ThreadId,
    pub value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Feedback {
    pub fn new(thread_id: impl Into<ThreadId>, for_id: impl Into<StepId>, value: i64) -> Self {
        Self {
            id: None,
            for_id: for_id.into(),
            thread_id: thread_id.into(),
            value,
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub(crate) fn to_document(&self) -> DocMap {
        let mut doc = DocMap::new();
        doc.insert("id".into(), self.id.clone().into());
        doc.insert("forId".into(), self.for_id.as_str().into());
        doc.insert("threadId".into(), self.thread_id.as_str().into());
        doc.insert("value".into(), self.value.into());
        doc.insert("comment".into(), self.comment.clone().into());
        doc
    }
}
