//! Filesystem storage implementation

mod document;

pub use document::FsDocumentStore;
