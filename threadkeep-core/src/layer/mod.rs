//! The adapter contract and its document-store implementation
//!
//! The host drives `DataLayer` with one call per event (login, turn start,
//! sub-step, turn end, listing, rating, deletion). `DocumentDataLayer`
//! translates each call into store operations:
//!
//! - step/element writes go through the session's `WriteCoordinator` queue
//! - `get_thread` joins the thread root with its ordered steps and elements
//! - `list_threads` pages a sorted listing with offset cursors
//! - feedback is embedded on the step that answers the rated one
//!
//! Store failures never escape read paths or fire-and-forget writes: they
//! are logged and replaced by the safe default (absent, empty, `false`).
//! Validation failures are always returned to the caller.

mod feedback;
mod listing;
mod threads;
mod users;
mod writes;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::storage::coordinator::{FlushReport, WriteCoordinator, WriteOp};
use crate::storage::error::{AdapterError, AdapterResult, ValidationError};
use crate::storage::handle::{Collection, CollectionKind, StoreHandle};
use crate::storage::ids::{ElementId, FeedbackId, SessionId, StepId, ThreadId, UserId};
use crate::storage::normalize::decode_document;
use crate::storage::traits::Document;
use crate::storage::types::{
    ElementDict, Feedback, PaginatedResponse, Pagination, PersistedUser, StepDict, ThreadDict,
    ThreadFilter, ThreadPatch, ThreadSummary, User,
};

pub use listing::paginate;

// ============================================================================
// Contract
// ============================================================================

/// Persistence operations invoked by the chat host
#[async_trait]
pub trait DataLayer: Send + Sync {
    /// The stored user, or `None` when absent
    async fn get_user(&self, identifier: &str) -> Option<PersistedUser>;

    /// Create a user; an existing user with the same identifier is returned as-is
    async fn create_user(&self, user: &User) -> Option<PersistedUser>;

    async fn get_or_create_user(&self, user: &User) -> Option<PersistedUser>;

    /// Attach feedback to the step answering `feedback.for_id`.
    /// Returns the composite id `<threadId>::<forId>`.
    async fn upsert_feedback(&self, feedback: &Feedback) -> AdapterResult<FeedbackId>;

    /// Remove feedback by composite id. Returns whether anything was removed.
    async fn delete_feedback(&self, feedback_id: &str) -> AdapterResult<bool>;

    async fn create_step(&self, session: &SessionId, step: StepDict);

    async fn update_step(&self, session: &SessionId, step: StepDict);

    /// Delete a step; its thread is resolved by lookup
    async fn delete_step(&self, session: &SessionId, step_id: &StepId);

    async fn get_thread(&self, thread_id: &ThreadId) -> Option<ThreadDict>;

    async fn list_threads(
        &self,
        pagination: &Pagination,
        filter: &ThreadFilter,
    ) -> AdapterResult<PaginatedResponse<ThreadSummary>>;

    /// Merge-patch the thread root, creating it when absent
    async fn update_thread(&self, thread_id: &ThreadId, patch: ThreadPatch);

    /// Steps of a thread, ascending by `createdAt`
    async fn get_steps(&self, thread_id: &ThreadId) -> Vec<StepDict>;

    async fn create_element(&self, session: &SessionId, element: ElementDict);

    async fn get_element(&self, thread_id: &ThreadId, element_id: &ElementId) -> Option<ElementDict>;

    /// Fails fast, before anything is queued, when `thread_id` is missing
    async fn delete_element(
        &self,
        session: &SessionId,
        element_id: &ElementId,
        thread_id: Option<&ThreadId>,
    ) -> AdapterResult<()>;

    /// The owning user id, or an empty string
    async fn get_thread_author(&self, thread_id: &ThreadId) -> String;

    /// Delete the thread root only; steps and elements are left in place
    async fn delete_thread(&self, thread_id: &ThreadId);

    /// Steps flagged `metadata.favorite` across the user's threads, newest first
    async fn get_favorite_steps(&self, user_id: &UserId) -> Vec<StepDict>;

    fn build_debug_url(&self) -> String;

    /// The user message of the session's turn is committed: flush its
    /// buffered writes and let later ones through
    async fn release(&self, session: &SessionId) -> FlushReport;

    /// The session went away; drop writes still waiting for release.
    /// Hosts must call this on every session close: a released session's
    /// queue is kept until then.
    async fn end_session(&self, session: &SessionId) -> usize;

    async fn close(&self);
}

// ============================================================================
// Document store implementation
// ============================================================================

/// `DataLayer` over a provisioned `StoreHandle`
pub struct DocumentDataLayer {
    handle: Arc<StoreHandle>,
    coordinator: WriteCoordinator,
}

impl DocumentDataLayer {
    /// Provision the store and build the adapter. Provisioning failures
    /// are returned: the adapter cannot run without its collections.
    pub async fn new(handle: Arc<StoreHandle>) -> AdapterResult<Self> {
        handle.ensure_ready().await?;
        info!(backend = %handle.describe(), "Document data layer initialized");
        Ok(Self {
            handle,
            coordinator: WriteCoordinator::new(),
        })
    }

    pub fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    pub fn coordinator(&self) -> &WriteCoordinator {
        &self.coordinator
    }

    fn collection(&self, kind: CollectionKind) -> AdapterResult<Collection> {
        self.handle.collection(kind)
    }
}

/// Decode stored documents, skipping (and reporting) the ones that don't fit
fn decode_all<T: DeserializeOwned>(kind: CollectionKind, docs: Vec<Document>) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match decode_document(doc) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(collection = %kind, id = ?doc.get("id"), error = %e, "Skipping undecodable document");
                None
            }
        })
        .collect()
}

/// Replace a failure with the safe default
fn degrade<T>(operation: &'static str, result: AdapterResult<T>, fallback: T) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            error!(operation, error = %e, "Store operation failed");
            fallback
        }
    }
}

/// Like `degrade`, but validation failures still reach the caller
fn settle<T>(operation: &'static str, result: AdapterResult<T>, fallback: T) -> AdapterResult<T> {
    match result {
        Err(AdapterError::Validation(e)) => Err(e.into()),
        other => Ok(degrade(operation, other, fallback)),
    }
}

#[async_trait]
impl DataLayer for DocumentDataLayer {
    async fn get_user(&self, identifier: &str) -> Option<PersistedUser> {
        degrade("get_user", self.find_user(identifier).await, None)
    }

    async fn create_user(&self, user: &User) -> Option<PersistedUser> {
        degrade("create_user", self.insert_user(user).await.map(Some), None)
    }

    async fn get_or_create_user(&self, user: &User) -> Option<PersistedUser> {
        match self.get_user(&user.identifier).await {
            Some(existing) => Some(existing),
            None => self.create_user(user).await,
        }
    }

    async fn upsert_feedback(&self, feedback: &Feedback) -> AdapterResult<FeedbackId> {
        self.attach_feedback(feedback)
            .await
            .inspect_err(|e| error!(thread_id = %feedback.thread_id, error = %e, "Error upserting feedback"))
    }

    async fn delete_feedback(&self, feedback_id: &str) -> AdapterResult<bool> {
        settle("delete_feedback", self.detach_feedback(feedback_id).await, false)
    }

    async fn create_step(&self, session: &SessionId, step: StepDict) {
        self.submit(session, WriteOp::CreateStep(step)).await;
    }

    async fn update_step(&self, session: &SessionId, step: StepDict) {
        self.submit(session, WriteOp::UpdateStep(step)).await;
    }

    async fn delete_step(&self, session: &SessionId, step_id: &StepId) {
        self.submit(session, WriteOp::DeleteStep(step_id.clone())).await;
    }

    async fn get_thread(&self, thread_id: &ThreadId) -> Option<ThreadDict> {
        degrade("get_thread", self.assemble_thread(thread_id).await, None)
    }

    async fn list_threads(
        &self,
        pagination: &Pagination,
        filter: &ThreadFilter,
    ) -> AdapterResult<PaginatedResponse<ThreadSummary>> {
        settle(
            "list_threads",
            self.page_threads(pagination, filter).await,
            PaginatedResponse::empty(),
        )
    }

    async fn update_thread(&self, thread_id: &ThreadId, patch: ThreadPatch) {
        degrade("update_thread", self.patch_thread(thread_id, patch).await, ());
    }

    async fn get_steps(&self, thread_id: &ThreadId) -> Vec<StepDict> {
        degrade("get_steps", self.ordered_steps(thread_id).await, Vec::new())
    }

    async fn create_element(&self, session: &SessionId, element: ElementDict) {
        self.submit(session, WriteOp::CreateElement(element)).await;
    }

    async fn get_element(&self, thread_id: &ThreadId, element_id: &ElementId) -> Option<ElementDict> {
        degrade("get_element", self.find_element(thread_id, element_id).await, None)
    }

    async fn delete_element(
        &self,
        session: &SessionId,
        element_id: &ElementId,
        thread_id: Option<&ThreadId>,
    ) -> AdapterResult<()> {
        let Some(thread_id) = thread_id else {
            error!(element_id = %element_id, "delete_element requires a thread id");
            return Err(ValidationError::MissingThreadId(element_id.to_string()).into());
        };
        let op = WriteOp::DeleteElement {
            element_id: element_id.clone(),
            thread_id: thread_id.clone(),
        };
        self.submit(session, op).await;
        Ok(())
    }

    async fn get_thread_author(&self, thread_id: &ThreadId) -> String {
        degrade("get_thread_author", self.thread_author(thread_id).await, String::new())
    }

    async fn delete_thread(&self, thread_id: &ThreadId) {
        degrade("delete_thread", self.remove_thread(thread_id).await, ());
    }

    async fn get_favorite_steps(&self, user_id: &UserId) -> Vec<StepDict> {
        degrade("get_favorite_steps", self.favorite_steps(user_id).await, Vec::new())
    }

    fn build_debug_url(&self) -> String {
        self.handle.describe()
    }

    async fn release(&self, session: &SessionId) -> FlushReport {
        let mut flush = self.coordinator.release(session).await;
        let report = self.apply_batch(flush.take_ops()).await;
        drop(flush);
        if report.total() > 0 {
            info!(
                session = %session,
                applied = report.applied,
                failed = report.failures.len(),
                "Flushed queued writes"
            );
        }
        report
    }

    async fn end_session(&self, session: &SessionId) -> usize {
        let dropped = self.coordinator.end_session(session);
        if dropped > 0 {
            info!(session = %session, dropped, "Session ended before release; queued writes dropped");
        }
        dropped
    }

    async fn close(&self) {
        self.handle.close().await;
    }
}
