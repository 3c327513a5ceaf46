//! Write coordinator - per-session buffering of step/element writes
//!
//! A session's writes are held in arrival order until the host signals that
//! the user message anchoring the turn has been committed (`release`). The
//! released batch is handed back to the caller for execution; later writes
//! for the same session pass straight through. Ending a session before its
//! release drops whatever is buffered.
//!
//! The coordinator never touches the store. Each session has a write gate
//! (an async mutex): a flush holds it for the whole batch and every
//! pass-through write takes it, so writes for one document are never
//! reordered relative to submission.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::storage::error::AdapterError;
use crate::storage::handle::CollectionKind;
use crate::storage::ids::{ElementId, SessionId, StepId, ThreadId};
use crate::storage::types::{ElementDict, StepDict};

/// A gated write request
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    CreateStep(StepDict),
    UpdateStep(StepDict),
    DeleteStep(StepId),
    CreateElement(ElementDict),
    DeleteElement {
        element_id: ElementId,
        thread_id: ThreadId,
    },
}

/// The document a write touches: collection plus id
pub type DocumentKey = (CollectionKind, String);

impl WriteOp {
    pub fn target(&self) -> DocumentKey {
        match self {
            WriteOp::CreateStep(step) | WriteOp::UpdateStep(step) => {
                (CollectionKind::Steps, step.id.as_str().to_string())
            }
            WriteOp::DeleteStep(id) => (CollectionKind::Steps, id.as_str().to_string()),
            WriteOp::CreateElement(element) => {
                (CollectionKind::Elements, element.id.as_str().to_string())
            }
            WriteOp::DeleteElement { element_id, .. } => {
                (CollectionKind::Elements, element_id.as_str().to_string())
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WriteOp::CreateStep(_) => "create_step",
            WriteOp::UpdateStep(_) => "update_step",
            WriteOp::DeleteStep(_) => "delete_step",
            WriteOp::CreateElement(_) => "create_element",
            WriteOp::DeleteElement { .. } => "delete_element",
        }
    }
}

/// Split a batch into per-document groups.
///
/// Groups appear in order of each document's first write; inside a group
/// operations keep their arrival order.
pub fn group_by_document(ops: Vec<WriteOp>) -> Vec<Vec<WriteOp>> {
    let mut index: HashMap<DocumentKey, usize> = HashMap::new();
    let mut groups: Vec<Vec<WriteOp>> = Vec::new();
    for op in ops {
        let slot = *index.entry(op.target()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(op);
    }
    groups
}

type WriteGate = Arc<AsyncMutex<()>>;

#[derive(Debug)]
enum QueueState {
    Buffering(Vec<WriteOp>),
    Released,
}

#[derive(Debug)]
struct SessionQueue {
    state: QueueState,
    gate: WriteGate,
}

impl Default for SessionQueue {
    fn default() -> Self {
        Self {
            state: QueueState::Buffering(Vec::new()),
            gate: Arc::new(AsyncMutex::new(())),
        }
    }
}

/// A write admitted for immediate execution on a released session
#[derive(Debug)]
pub struct PassThrough {
    op: WriteOp,
    gate: WriteGate,
}

impl PassThrough {
    /// Wait for the session's write gate; hold the guard while executing
    pub async fn acquire(self) -> (WriteOp, OwnedMutexGuard<()>) {
        let guard = self.gate.lock_owned().await;
        (self.op, guard)
    }
}

/// Outcome of submitting a write
#[derive(Debug)]
pub enum Admission {
    /// Buffered until release; `pending` is the session's queue length
    Queued { pending: usize },
    Ready(PassThrough),
}

/// A released batch. The guard keeps later pass-through writes waiting
/// until the batch has been executed and the flush is dropped.
#[derive(Debug)]
pub struct Flush {
    pub ops: Vec<WriteOp>,
    _guard: OwnedMutexGuard<()>,
}

impl Flush {
    /// Move the batch out while the flush keeps holding the write gate
    pub fn take_ops(&mut self) -> Vec<WriteOp> {
        std::mem::take(&mut self.ops)
    }
}

/// A failed write from a flushed batch or a pass-through write
#[derive(Debug)]
pub struct FlushFailure {
    pub operation: &'static str,
    pub target: String,
    pub error: AdapterError,
}

/// Per-operation results of executing a batch
#[derive(Debug, Default)]
pub struct FlushReport {
    pub applied: usize,
    pub failures: Vec<FlushFailure>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total(&self) -> usize {
        self.applied + self.failures.len()
    }
}

/// Per-session write queues with a release barrier
#[derive(Debug, Default)]
pub struct WriteCoordinator {
    sessions: Mutex<HashMap<SessionId, SessionQueue>>,
}

impl WriteCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, SessionQueue>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffer a write, or admit it directly once the session is released
    pub fn submit(&self, session: &SessionId, op: WriteOp) -> Admission {
        let mut sessions = self.sessions();
        let queue = sessions.entry(session.clone()).or_default();
        match &mut queue.state {
            QueueState::Buffering(ops) => {
                debug!(session = %session, operation = op.name(), "Queued until user message");
                ops.push(op);
                Admission::Queued { pending: ops.len() }
            }
            QueueState::Released => Admission::Ready(PassThrough {
                op,
                gate: Arc::clone(&queue.gate),
            }),
        }
    }

    /// Release barrier: drain the session's buffer in arrival order and
    /// switch it to pass-through. Releasing twice yields an empty batch.
    /// The session's entry lives until `end_session`.
    pub async fn release(&self, session: &SessionId) -> Flush {
        let gate = {
            let mut sessions = self.sessions();
            Arc::clone(&sessions.entry(session.clone()).or_default().gate)
        };
        let guard = gate.lock_owned().await;

        let ops = {
            let mut sessions = self.sessions();
            let queue = sessions.entry(session.clone()).or_default();
            match std::mem::replace(&mut queue.state, QueueState::Released) {
                QueueState::Buffering(ops) => ops,
                QueueState::Released => Vec::new(),
            }
        };
        debug!(session = %session, count = ops.len(), "Releasing queued writes");
        Flush { ops, _guard: guard }
    }

    /// Forget a session, dropping writes still waiting for release.
    /// Returns how many were dropped.
    pub fn end_session(&self, session: &SessionId) -> usize {
        match self.sessions().remove(session) {
            Some(SessionQueue {
                state: QueueState::Buffering(ops),
                ..
            }) => ops.len(),
            _ => 0,
        }
    }

    /// Number of writes buffered for a session
    pub fn pending(&self, session: &SessionId) -> usize {
        match self.sessions().get(session) {
            Some(SessionQueue {
                state: QueueState::Buffering(ops),
                ..
            }) => ops.len(),
            _ => 0,
        }
    }

    pub fn is_released(&self, session: &SessionId) -> bool {
        matches!(
            self.sessions().get(session),
            Some(SessionQueue {
                state: QueueState::Released,
                ..
            })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str) -> StepDict {
        StepDict::new(id, "t1", "tool")
    }

    fn ids(ops: &[WriteOp]) -> Vec<String> {
        ops.iter().map(|op| op.target().1).collect()
    }

    #[tokio::test]
    async fn test_buffers_until_release_in_arrival_order() {
        let coordinator = WriteCoordinator::new();
        let session = SessionId::from("sess");

        for id in ["s1", "s2", "s3"] {
            assert!(matches!(
                coordinator.submit(&session, WriteOp::CreateStep(step(id))),
                Admission::Queued { .. }
            ));
        }
        let updated = step("s2").with_output("revised");
        coordinator.submit(&session, WriteOp::UpdateStep(updated.clone()));
        assert_eq!(coordinator.pending(&session), 4);

        let flush = coordinator.release(&session).await;
        assert_eq!(ids(&flush.ops), vec!["s1", "s2", "s3", "s2"]);
        assert_eq!(flush.ops[3], WriteOp::UpdateStep(updated));
        assert!(coordinator.is_released(&session));
        assert_eq!(coordinator.pending(&session), 0);
    }

    #[tokio::test]
    async fn test_released_session_passes_through() {
        let coordinator = WriteCoordinator::new();
        let session = SessionId::from("sess");
        drop(coordinator.release(&session).await);

        let admission = coordinator.submit(&session, WriteOp::DeleteStep(StepId::from("s9")));
        let Admission::Ready(pass) = admission else {
            panic!("expected pass-through");
        };
        let (op, _guard) = pass.acquire().await;
        assert_eq!(op, WriteOp::DeleteStep(StepId::from("s9")));
    }

    #[tokio::test]
    async fn test_pass_through_waits_for_flush() {
        let coordinator = WriteCoordinator::new();
        let session = SessionId::from("sess");
        coordinator.submit(&session, WriteOp::CreateStep(step("s1")));

        let flush = coordinator.release(&session).await;
        let Admission::Ready(pass) = coordinator.submit(&session, WriteOp::UpdateStep(step("s1"))) else {
            panic!("expected pass-through");
        };

        let waiter = tokio::spawn(pass.acquire());
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(flush);
        let (op, _guard) = waiter.await.unwrap();
        assert_eq!(op.name(), "update_step");
    }

    #[tokio::test]
    async fn test_end_session_drops_buffer() {
        let coordinator = WriteCoordinator::new();
        let session = SessionId::from("sess");
        coordinator.submit(&session, WriteOp::CreateStep(step("s1")));
        coordinator.submit(&session, WriteOp::CreateStep(step("s2")));

        assert_eq!(coordinator.end_session(&session), 2);
        assert_eq!(coordinator.pending(&session), 0);

        // A later release for the same id finds nothing buffered
        let flush = coordinator.release(&session).await;
        assert!(flush.ops.is_empty());
    }

    #[tokio::test]
    async fn test_end_session_forgets_released_session() {
        let coordinator = WriteCoordinator::new();
        let session = SessionId::from("sess");
        drop(coordinator.release(&session).await);
        assert!(coordinator.is_released(&session));

        assert_eq!(coordinator.end_session(&session), 0);
        assert!(!coordinator.is_released(&session));
        assert!(coordinator.sessions().is_empty());

        // The id starts over with a fresh buffer
        assert!(matches!(
            coordinator.submit(&session, WriteOp::CreateStep(step("s1"))),
            Admission::Queued { pending: 1 }
        ));
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let coordinator = WriteCoordinator::new();
        let a = SessionId::from("a");
        let b = SessionId::from("b");
        coordinator.submit(&a, WriteOp::CreateStep(step("s1")));
        coordinator.submit(&b, WriteOp::CreateStep(step("s2")));

        let flush = coordinator.release(&a).await;
        assert_eq!(ids(&flush.ops), vec!["s1"]);
        assert_eq!(coordinator.pending(&b), 1);
        assert!(!coordinator.is_released(&b));
    }

    #[test]
    fn test_group_by_document_keeps_per_document_order() {
        let ops = vec![
            WriteOp::CreateStep(step("s1")),
            WriteOp::CreateStep(step("s2")),
            WriteOp::UpdateStep(step("s1").with_output("x")),
            WriteOp::CreateElement(ElementDict::new("s1", "t1")),
            WriteOp::DeleteStep(StepId::from("s2")),
        ];
        let groups = group_by_document(ops);
        let shape: Vec<Vec<&str>> = groups
            .iter()
            .map(|g| g.iter().map(WriteOp::name).collect())
            .collect();
        assert_eq!(
            shape,
            vec![
                vec!["create_step", "update_step"],
                vec!["create_step", "delete_step"],
                vec!["create_element"],
            ]
        );
    }
}
