//! Thread assembly, thread root updates and thread-scoped reads

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::{decode_all, DocumentDataLayer};
use crate::storage::error::{AdapterResult, StoreError};
use crate::storage::handle::CollectionKind;
use crate::storage::helper::now;
use crate::storage::ids::{ElementId, ThreadId};
use crate::storage::normalize::{decode_document, format_timestamp, normalize_for_write, strip_internal};
use crate::storage::traits::{Document, Query, SortOrder};
use crate::storage::types::{ElementDict, StepDict, ThreadDict, ThreadPatch, ThreadRecord};

impl DocumentDataLayer {
    /// Root document plus ordered steps plus elements, or `None` when the
    /// root is absent. Failing step or element queries degrade to empty lists.
    pub(super) async fn assemble_thread(&self, thread_id: &ThreadId) -> AdapterResult<Option<ThreadDict>> {
        debug!(thread_id = %thread_id, "Retrieving thread");
        let threads = self.collection(CollectionKind::Threads)?;
        let root = match threads.read(thread_id.as_str(), thread_id.as_str()).await {
            Ok(doc) => doc,
            Err(e) if e.is_not_found() => {
                warn!(thread_id = %thread_id, "Thread not found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let root: ThreadRecord = decode_document(&root).map_err(StoreError::from)?;
        debug!(thread_id = %thread_id, "Thread found, fetching steps and elements");

        let steps = self.ordered_steps(thread_id).await.unwrap_or_else(|e| {
            error!(thread_id = %thread_id, error = %e, "Error retrieving steps");
            Vec::new()
        });
        let elements = self.thread_elements(thread_id).await.unwrap_or_else(|e| {
            error!(thread_id = %thread_id, error = %e, "Error querying elements");
            Vec::new()
        });

        debug!(
            thread_id = %thread_id,
            steps = steps.len(),
            elements = elements.len(),
            "Thread assembled"
        );
        Ok(Some(ThreadDict::assemble(root, steps, elements)))
    }

    /// Steps of one thread, sorted by the store on `createdAt`
    pub(super) async fn ordered_steps(&self, thread_id: &ThreadId) -> AdapterResult<Vec<StepDict>> {
        debug!(thread_id = %thread_id, "Retrieving steps");
        let steps = self.collection(CollectionKind::Steps)?;
        let query = Query::partition(thread_id.as_str())
            .eq("threadId", thread_id.as_str())
            .order_by("createdAt", SortOrder::Asc);
        let docs = steps.query(&query).await?;
        debug!(thread_id = %thread_id, count = docs.len(), "Retrieved steps");
        Ok(decode_all(CollectionKind::Steps, docs))
    }

    async fn thread_elements(&self, thread_id: &ThreadId) -> AdapterResult<Vec<ElementDict>> {
        let elements = self.collection(CollectionKind::Elements)?;
        let query = Query::partition(thread_id.as_str()).eq("threadId", thread_id.as_str());
        let docs = elements.query(&query).await?;
        Ok(decode_all(CollectionKind::Elements, docs))
    }

    /// Read-modify-write of the thread root. A missing root is created with
    /// `createdAt = now`; metadata keys are merged, everything else replaced.
    pub(super) async fn patch_thread(&self, thread_id: &ThreadId, patch: ThreadPatch) -> AdapterResult<()> {
        debug!(thread_id = %thread_id, "Updating thread");
        let threads = self.collection(CollectionKind::Threads)?;
        let mut doc = match threads.read(thread_id.as_str(), thread_id.as_str()).await {
            Ok(stored) => strip_internal(&stored),
            Err(e) if e.is_not_found() => {
                info!(thread_id = %thread_id, "Thread not found for update, creating new thread");
                new_thread_root(thread_id)
            }
            Err(e) => return Err(e.into()),
        };

        apply_patch(&mut doc, patch);
        threads.upsert(doc).await?;
        info!(thread_id = %thread_id, "Thread updated");
        Ok(())
    }

    pub(super) async fn thread_author(&self, thread_id: &ThreadId) -> AdapterResult<String> {
        debug!(thread_id = %thread_id, "Retrieving thread author");
        let threads = self.collection(CollectionKind::Threads)?;
        match threads.read(thread_id.as_str(), thread_id.as_str()).await {
            Ok(doc) => {
                let author = doc
                    .get("userId")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                debug!(thread_id = %thread_id, author = %author, "Thread author retrieved");
                Ok(author)
            }
            Err(e) if e.is_not_found() => {
                info!(thread_id = %thread_id, "Thread not found when getting author");
                Ok(String::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes the root only
    pub(super) async fn remove_thread(&self, thread_id: &ThreadId) -> AdapterResult<()> {
        debug!(thread_id = %thread_id, "Deleting thread");
        let threads = self.collection(CollectionKind::Threads)?;
        match threads.delete(thread_id.as_str(), thread_id.as_str()).await {
            Ok(()) => info!(thread_id = %thread_id, "Thread deleted"),
            Err(e) if e.is_not_found() => info!(thread_id = %thread_id, "Thread not found for deletion"),
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    pub(super) async fn find_element(
        &self,
        thread_id: &ThreadId,
        element_id: &ElementId,
    ) -> AdapterResult<Option<ElementDict>> {
        debug!(thread_id = %thread_id, element_id = %element_id, "Retrieving element");
        let elements = self.collection(CollectionKind::Elements)?;
        match elements.read(element_id.as_str(), thread_id.as_str()).await {
            Ok(doc) => Ok(Some(decode_document(&doc).map_err(StoreError::from)?)),
            Err(e) if e.is_not_found() => {
                info!(thread_id = %thread_id, element_id = %element_id, "Element not found");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn new_thread_root(thread_id: &ThreadId) -> Document {
    let mut doc = Document::new();
    doc.insert("id".into(), Value::String(thread_id.to_string()));
    doc.insert("createdAt".into(), Value::String(format_timestamp(&now())));
    doc
}

/// Merge-patch semantics: `None` fields are untouched, metadata keys are
/// merged into the stored map, and a new owner sets both `userId` and
/// `userIdentifier`.
fn apply_patch(doc: &mut Document, patch: ThreadPatch) {
    if let Some(name) = patch.name {
        doc.insert("name".into(), Value::String(name));
    }
    if let Some(user_id) = patch.user_id {
        doc.insert("userId".into(), Value::String(user_id.to_string()));
        doc.insert("userIdentifier".into(), Value::String(user_id.into_string()));
    }
    if let Some(metadata) = patch.metadata {
        let entry = doc
            .entry("metadata")
            .or_insert_with(|| Value::Object(Document::new()));
        if !entry.is_object() {
            *entry = Value::Object(Document::new());
        }
        if let Value::Object(stored) = entry {
            stored.extend(normalize_for_write(metadata));
        }
    }
    if let Some(tags) = patch.tags {
        doc.insert("tags".into(), Value::from(tags));
    }
}
