//! Storage types
//!
//! Typed records for the four persisted entity kinds plus the open-map
//! value model they share.

pub mod element;
pub mod pagination;
pub mod step;
pub mod thread;
pub mod user;
pub mod value;

pub use element::ElementDict;
pub use pagination::{PageInfo, PaginatedResponse, Pagination};
pub use step::{Feedback, StepDict};
pub use thread::{ThreadDict, ThreadFilter, ThreadPatch, ThreadRecord, ThreadSummary};
pub use user::{PersistedUser, User};
pub use value::{doc_map_from_json, DocMap, DocValue, Metadata};
