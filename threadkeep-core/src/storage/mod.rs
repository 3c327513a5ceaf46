//! Storage layer: the document-store seam and everything below the adapter
//!
//! - `traits` - the `DocumentStore` client seam and structured queries
//! - `implementations` - `MemoryDocumentStore` and `FsDocumentStore`
//! - `handle` - provisioning state and per-collection accessors
//! - `normalize` - timestamp rendering on write, internal-field stripping on read
//! - `coordinator` - per-session write buffering behind a release barrier
//! - `types` - typed records for users, threads, steps, elements and feedback

pub mod coordinator;
pub mod error;
pub mod handle;
pub mod helper;
pub mod ids;
pub mod implementations;
pub mod normalize;
pub mod query;
pub mod traits;
pub mod types;

pub use coordinator::{Admission, Flush, FlushFailure, FlushReport, WriteCoordinator, WriteOp};
pub use error::{AdapterError, AdapterResult, StoreError, StoreResult, ValidationError};
pub use handle::{Collection, CollectionKind, StoreHandle};
pub use ids::{ElementId, FeedbackId, SessionId, StepId, ThreadId, UserId};
pub use implementations::{FsDocumentStore, MemoryDocumentStore};
pub use traits::{ContainerSpec, Document, DocumentStore, Filter, OrderBy, Query, SortOrder};
