//! Element types (attachments and generated artifacts)

use serde::{Deserialize, Serialize};

use crate::storage::ids::{ElementId, StepId, ThreadId};
use crate::storage::types::{DocMap, DocValue};

/// An attachment or artifact stored alongside a thread's steps.
///
/// Payloads live elsewhere; the element carries references to them
/// (`url`, `objectKey`) plus display hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDict {
    pub id: ElementId,
    pub thread_id: ThreadId,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    /// Step this element belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub for_id: Option<StepId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<DocMap>,
    #[serde(flatten)]
    pub extra: DocMap,
}

impl ElementDict {
    pub fn new(id: impl Into<ElementId>, thread_id: impl Into<ThreadId>) -> Self {
        Self {
            id: id.into(),
            thread_id: thread_id.into(),
            element_type: None,
            name: None,
            display: None,
            url: None,
            object_key: None,
            mime: None,
            for_id: None,
            props: None,
            extra: DocMap::new(),
        }
    }

    pub fn with_type(mut self, element_type: impl Into<String>) -> Self {
        self.element_type = Some(element_type.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn for_step(mut self, step_id: impl Into<StepId>) -> Self {
        self.for_id = Some(step_id.into());
        self
    }

    pub(crate) fn to_document(&self) -> DocMap {
        let mut doc = self.extra.clone();
        doc.insert("id".into(), self.id.as_str().into());
        doc.insert("threadId".into(), self.thread_id.as_str().into());

        let optional: [(&str, Option<DocValue>); 8] = [
            ("type", self.element_type.clone().map(DocValue::from)),
            ("name", self.name.clone().map(DocValue::from)),
            ("display", self.display.clone().map(DocValue::from)),
            ("url", self.url.clone().map(DocValue::from)),
            ("objectKey", self.object_key.clone().map(DocValue::from)),
            ("mime", self.mime.clone().map(DocValue::from)),
            ("forId", self.for_id.as_ref().map(|s| s.as_str().into())),
            ("props", self.props.clone().map(DocValue::Object)),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                doc.insert(key.into(), value);
            }
        }
        doc
    }
}
