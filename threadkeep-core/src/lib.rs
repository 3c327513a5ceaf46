//! Conversation persistence over a partitioned document store
//!
//! This crate provides:
//! - **Store seam**: `DocumentStore` trait with `MemoryDocumentStore` and `FsDocumentStore` backends
//! - **Handle**: `StoreHandle` provisioning the `users`, `threads`, `steps` and `elements` collections
//! - **Write coordination**: `WriteCoordinator` buffering a session's step/element writes until release
//! - **Adapter**: `DataLayer` contract implemented by `DocumentDataLayer`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use threadkeep_core::{DataLayer, DocumentDataLayer, MemoryDocumentStore, StoreHandle};
//!
//! let handle = Arc::new(StoreHandle::new(Arc::new(MemoryDocumentStore::new()), "threadkeep"));
//! let layer = DocumentDataLayer::new(handle).await?;
//! let thread = layer.get_thread(&"t1".into()).await;
//! ```
pub mod layer;
pub mod storage;

pub use layer::{DataLayer, DocumentDataLayer};
pub use storage::types::{
    DocMap, DocValue, ElementDict, Feedback, Metadata, PageInfo, PaginatedResponse, Pagination,
    PersistedUser, StepDict, ThreadDict, ThreadFilter, ThreadPatch, ThreadRecord, ThreadSummary,
    User,
};
pub use storage::{
    AdapterError, AdapterResult, CollectionKind, DocumentStore, ElementId, FeedbackId, FlushReport,
    FsDocumentStore, MemoryDocumentStore, SessionId, StepId, StoreError, StoreHandle, ThreadId,
    UserId, ValidationError,
};
