//! Storage backend implementations
//!
//! - `memory` - in-memory partitioned store (tests, embedding)
//! - `fs` - JSON files on disk

pub mod fs;
pub mod memory;

pub use fs::FsDocumentStore;
pub use memory::MemoryDocumentStore;
