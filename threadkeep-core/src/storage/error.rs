//! Error taxonomy for the store boundary and the adapter contract

use thiserror::Error;

/// Failures reported by a `DocumentStore` backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document '{id}' not found in '{container}'")]
    NotFound { container: String, id: String },

    #[error("document '{id}' already exists in '{container}'")]
    Conflict { container: String, id: String },

    #[error("document in '{container}' has no value at partition key path '{path}'")]
    MissingPartitionKey { container: String, path: String },

    #[error("document in '{container}' has no string 'id'")]
    MissingId { container: String },

    #[error("container '{container}' does not exist in database '{database}'")]
    UnknownContainer { database: String, container: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store client is closed")]
    Closed,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Caller mistakes the adapter rejects before (or instead of) touching the store
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid feedback id '{0}': expected '<threadId>::<forId>'")]
    MalformedFeedbackId(String),

    #[error("feedback must have a threadId and forId")]
    MissingFeedbackTarget,

    #[error("step with id or parentId '{for_id}' not found in thread '{thread_id}'")]
    UnresolvedFeedbackTarget { thread_id: String, for_id: String },

    #[error("deleting element '{0}' requires a thread id")]
    MissingThreadId(String),

    #[error("invalid pagination cursor '{0}'")]
    InvalidCursor(String),

    #[error("page size must be at least 1")]
    InvalidPageSize,
}

/// Errors surfaced across the adapter contract
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AdapterError {
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            AdapterError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type AdapterResult<T> = Result<T, AdapterError>;
