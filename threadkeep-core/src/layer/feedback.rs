//! Feedback attached to steps
//!
//! Feedback rates the step the user saw. The host names the step it asked
//! about (`forId`); the rating lands on the reply whose `parentId` is that
//! step, or on `forId` itself when no reply exists.

use serde_json::Value;
use tracing::{debug, error, info};

use super::DocumentDataLayer;
use crate::storage::error::{AdapterResult, ValidationError};
use crate::storage::handle::{Collection, CollectionKind};
use crate::storage::ids::{FeedbackId, StepId, ThreadId};
use crate::storage::normalize::{normalize_for_write, strip_internal};
use crate::storage::traits::{Document, Query};
use crate::storage::types::Feedback;

/// Reply to `for_id` within the thread, falling back to `for_id` itself
async fn resolve_target(
    steps: &Collection,
    thread_id: &ThreadId,
    for_id: &StepId,
) -> AdapterResult<Option<Document>> {
    let query = Query::partition(thread_id.as_str())
        .eq("threadId", thread_id.as_str())
        .eq("parentId", for_id.as_str());
    if let Some(reply) = steps.query(&query).await?.into_iter().next() {
        return Ok(Some(reply));
    }

    debug!(thread_id = %thread_id, for_id = %for_id, "No reply step, targeting the step itself");
    match steps.read(for_id.as_str(), thread_id.as_str()).await {
        Ok(step) => Ok(Some(step)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn step_id_of(doc: &Document) -> &str {
    doc.get("id").and_then(Value::as_str).unwrap_or_default()
}

impl DocumentDataLayer {
    pub(super) async fn attach_feedback(&self, feedback: &Feedback) -> AdapterResult<FeedbackId> {
        if feedback.thread_id.as_str().is_empty() || feedback.for_id.as_str().is_empty() {
            return Err(ValidationError::MissingFeedbackTarget.into());
        }
        let steps = self.collection(CollectionKind::Steps)?;
        let target = resolve_target(&steps, &feedback.thread_id, &feedback.for_id)
            .await?
            .ok_or_else(|| ValidationError::UnresolvedFeedbackTarget {
                thread_id: feedback.thread_id.to_string(),
                for_id: feedback.for_id.to_string(),
            })?;

        let id = FeedbackId::compose(&feedback.thread_id, &feedback.for_id);
        let mut stamped = feedback.clone();
        stamped.id = Some(id.to_string());

        let mut step = strip_internal(&target);
        step.insert(
            "feedback".into(),
            Value::Object(normalize_for_write(stamped.to_document())),
        );
        steps.upsert(step).await?;

        info!(step_id = step_id_of(&target), feedback_id = %id, "Feedback upserted");
        Ok(id)
    }

    /// Returns `false` when there was no feedback to remove
    pub(super) async fn detach_feedback(&self, raw_id: &str) -> AdapterResult<bool> {
        let Some((thread_id, for_id)) = FeedbackId::parse(raw_id) else {
            error!(feedback_id = raw_id, "Invalid feedback id format");
            return Err(ValidationError::MalformedFeedbackId(raw_id.to_string()).into());
        };

        let steps = self.collection(CollectionKind::Steps)?;
        let Some(target) = resolve_target(&steps, &thread_id, &for_id).await? else {
            debug!(feedback_id = raw_id, "No step found for feedback");
            return Ok(false);
        };
        if !target.contains_key("feedback") {
            debug!(step_id = step_id_of(&target), "Step carries no feedback");
            return Ok(false);
        }

        let mut step = strip_internal(&target);
        step.remove("feedback");
        steps.upsert(step).await?;

        info!(step_id = step_id_of(&target), feedback_id = raw_id, "Feedback deleted");
        Ok(true)
    }
}
