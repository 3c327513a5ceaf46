//! Storage trait definitions
//!
//! Implementations live in `implementations/`.

mod document;

pub use document::{ContainerSpec, Document, DocumentStore, Filter, OrderBy, Query, SortOrder};
