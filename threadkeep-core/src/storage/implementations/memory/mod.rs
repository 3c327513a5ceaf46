//! In-memory storage implementation for testing
//!
//! Stores data in memory; useful for unit tests where you don't want to
//! touch the filesystem.

mod document;

pub use document::{MemoryDocumentStore, WriteKind, WriteRecord};
