//! Executing step and element writes
//!
//! Writes reach this module either through a released batch or as
//! pass-through writes on an already released session. A batch is split per
//! document: one document's writes run in arrival order, distinct documents
//! run concurrently. Failures are collected, never rolled back.

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, error, info};

use super::DocumentDataLayer;
use crate::storage::coordinator::{
    group_by_document, Admission, FlushFailure, FlushReport, WriteOp,
};
use crate::storage::error::AdapterResult;
use crate::storage::handle::CollectionKind;
use crate::storage::ids::{SessionId, StepId};
use crate::storage::normalize::normalize_for_write;
use crate::storage::traits::Query;

impl DocumentDataLayer {
    /// Hand a write to the session's queue; execute it now if the session
    /// has already been released.
    pub(super) async fn submit(&self, session: &SessionId, op: WriteOp) {
        match self.coordinator.submit(session, op) {
            Admission::Queued { pending } => {
                debug!(session = %session, pending, "Write buffered");
            }
            Admission::Ready(pass) => {
                let (op, _gate) = pass.acquire().await;
                let (name, target) = (op.name(), op.target().1);
                if let Err(e) = self.apply(op).await {
                    error!(operation = name, target = %target, error = %e, "Error applying write");
                }
            }
        }
    }

    /// Run a released batch and report per-operation outcomes
    pub(super) async fn apply_batch(&self, ops: Vec<WriteOp>) -> FlushReport {
        let groups = group_by_document(ops);
        let outcomes = join_all(groups.into_iter().map(|group| async move {
            let mut outcomes = Vec::with_capacity(group.len());
            for op in group {
                let (name, target) = (op.name(), op.target().1);
                let result = self.apply(op).await;
                outcomes.push((name, target, result));
            }
            outcomes
        }))
        .await;

        let mut report = FlushReport::default();
        for (operation, target, result) in outcomes.into_iter().flatten() {
            match result {
                Ok(()) => report.applied += 1,
                Err(error) => {
                    error!(operation, target = %target, error = %error, "Error applying queued write");
                    report.failures.push(FlushFailure {
                        operation,
                        target,
                        error,
                    });
                }
            }
        }
        report
    }

    async fn apply(&self, op: WriteOp) -> AdapterResult<()> {
        match op {
            WriteOp::CreateStep(step) => {
                let steps = self.collection(CollectionKind::Steps)?;
                steps.create(normalize_for_write(step.to_document())).await?;
                debug!(step_id = %step.id, thread_id = %step.thread_id, "Step created");
            }
            WriteOp::UpdateStep(step) => {
                let steps = self.collection(CollectionKind::Steps)?;
                steps.upsert(normalize_for_write(step.to_document())).await?;
                debug!(step_id = %step.id, thread_id = %step.thread_id, "Step updated");
            }
            WriteOp::DeleteStep(step_id) => self.delete_step_anywhere(&step_id).await?,
            WriteOp::CreateElement(element) => {
                let elements = self.collection(CollectionKind::Elements)?;
                elements.upsert(normalize_for_write(element.to_document())).await?;
                debug!(element_id = %element.id, thread_id = %element.thread_id, "Element created");
            }
            WriteOp::DeleteElement {
                element_id,
                thread_id,
            } => {
                let elements = self.collection(CollectionKind::Elements)?;
                match elements.delete(element_id.as_str(), thread_id.as_str()).await {
                    Ok(()) => info!(element_id = %element_id, thread_id = %thread_id, "Element deleted"),
                    Err(e) if e.is_not_found() => {
                        info!(element_id = %element_id, thread_id = %thread_id, "Element not found for deletion")
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(())
    }

    /// Steps are partitioned by thread; find the owning thread first
    async fn delete_step_anywhere(&self, step_id: &StepId) -> AdapterResult<()> {
        debug!(step_id = %step_id, "Deleting step");
        let steps = self.collection(CollectionKind::Steps)?;
        let found = steps
            .query(&Query::cross_partition().eq("id", step_id.as_str()))
            .await?;
        let Some(thread_id) = found
            .first()
            .and_then(|doc| doc.get("threadId"))
            .and_then(Value::as_str)
        else {
            info!(step_id = %step_id, "Step not found for deletion");
            return Ok(());
        };

        match steps.delete(step_id.as_str(), thread_id).await {
            Ok(()) => info!(step_id = %step_id, thread_id, "Step deleted"),
            Err(e) if e.is_not_found() => info!(step_id = %step_id, "Step not found for deletion"),
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}
