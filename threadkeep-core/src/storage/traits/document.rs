//! DocumentStore trait: the partitioned document-store client seam
//!
//! A backend offers databases of containers; each container partitions its
//! documents by the value at one key path. Point operations are scoped to a
//! single partition, queries may span partitions. There are no
//! cross-document transactions.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::storage::error::StoreResult;

/// A stored JSON document
pub type Document = Map<String, Value>;

/// Container definition: name plus partition key path (e.g. `/threadId`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub partition_key_path: String,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>, partition_key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partition_key_path: partition_key_path.into(),
        }
    }

    /// Partition key path as a dotted field path (`/threadId` -> `threadId`)
    pub fn partition_field(&self) -> String {
        self.partition_key_path
            .trim_start_matches('/')
            .replace('/', ".")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// One query predicate; `field` is a dotted path into the document
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { field: String, value: Value },
    ContainsIgnoreCase { field: String, needle: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub order: SortOrder,
}

/// A structured query: optional partition scope, a conjunction of filters,
/// optional ordering. Without a partition key the query spans partitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub partition_key: Option<String>,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
}

impl Query {
    /// Query scoped to one partition
    pub fn partition(key: impl Into<String>) -> Self {
        Self {
            partition_key: Some(key.into()),
            ..Default::default()
        }
    }

    /// Query over every partition of the container
    pub fn cross_partition() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn contains_ignore_case(mut self, field: impl Into<String>, needle: impl Into<String>) -> Self {
        self.filters.push(Filter::ContainsIgnoreCase {
            field: field.into(),
            needle: needle.into(),
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            order,
        });
        self
    }
}

/// Trait for partitioned document-store backends
///
/// Failures are reported as `StoreError`; a point miss is
/// `StoreError::NotFound`, a duplicate create is `StoreError::Conflict`.
/// Returned documents include the store's `_`-prefixed bookkeeping fields.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create the database if absent (idempotent)
    async fn create_database_if_not_exists(&self, database: &str) -> StoreResult<()>;

    /// Create the container if absent (idempotent)
    async fn create_container_if_not_exists(
        &self,
        database: &str,
        spec: &ContainerSpec,
    ) -> StoreResult<()>;

    /// Point read by id within one partition
    async fn read_item(
        &self,
        database: &str,
        container: &str,
        id: &str,
        partition_key: &str,
    ) -> StoreResult<Document>;

    /// Run a structured query, returning full documents
    async fn query_items(
        &self,
        database: &str,
        container: &str,
        query: &Query,
    ) -> StoreResult<Vec<Document>>;

    /// Insert a new document; fails with `Conflict` if the id exists in its partition
    async fn create_item(
        &self,
        database: &str,
        container: &str,
        document: Document,
    ) -> StoreResult<Document>;

    /// Insert or fully replace a document
    async fn upsert_item(
        &self,
        database: &str,
        container: &str,
        document: Document,
    ) -> StoreResult<Document>;

    /// Delete by id within one partition
    async fn delete_item(
        &self,
        database: &str,
        container: &str,
        id: &str,
        partition_key: &str,
    ) -> StoreResult<()>;

    /// Short human-readable description of the backend
    fn describe(&self) -> String;

    /// Release client resources (best-effort)
    async fn close(&self) -> StoreResult<()>;
}
