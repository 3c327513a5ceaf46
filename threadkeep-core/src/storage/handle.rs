//! Store handle: provisioning state plus per-collection accessors
//!
//! The handle owns the shared store client. It is constructed explicitly,
//! provisioned once (`ensure_ready`), shared read-only afterwards and
//! closed on shutdown.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::storage::error::{AdapterError, AdapterResult, StoreError, StoreResult};
use crate::storage::traits::{ContainerSpec, Document, DocumentStore, Query};

/// The four logical collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Users,
    Threads,
    Steps,
    Elements,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 4] = [
        CollectionKind::Users,
        CollectionKind::Threads,
        CollectionKind::Steps,
        CollectionKind::Elements,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CollectionKind::Users => "users",
            CollectionKind::Threads => "threads",
            CollectionKind::Steps => "steps",
            CollectionKind::Elements => "elements",
        }
    }

    /// Users and threads partition on their own id; steps and elements
    /// on the owning thread.
    pub fn partition_key_path(&self) -> &'static str {
        match self {
            CollectionKind::Users | CollectionKind::Threads => "/id",
            CollectionKind::Steps | CollectionKind::Elements => "/threadId",
        }
    }

    pub fn spec(&self) -> ContainerSpec {
        ContainerSpec::new(self.name(), self.partition_key_path())
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CollectionKind {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CollectionKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| AdapterError::Configuration(format!("unknown collection '{}'", s)))
    }
}

/// Owns the store client and the database's provisioning state
pub struct StoreHandle {
    client: Arc<dyn DocumentStore>,
    database: String,
    ready: OnceCell<()>,
}

impl StoreHandle {
    pub fn new(client: Arc<dyn DocumentStore>, database: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
            ready: OnceCell::new(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    /// Create the database and its four collections if absent.
    ///
    /// Idempotent; after the first success this returns immediately.
    /// A failed attempt leaves the handle unprovisioned so a later call
    /// can retry.
    pub async fn ensure_ready(&self) -> StoreResult<()> {
        self.ready
            .get_or_try_init(|| async {
                debug!(database = %self.database, "Provisioning database and collections");
                self.client
                    .create_database_if_not_exists(&self.database)
                    .await
                    .inspect_err(|e| error!(database = %self.database, error = %e, "Error initializing database"))?;
                for kind in CollectionKind::ALL {
                    let spec = kind.spec();
                    self.client
                        .create_container_if_not_exists(&self.database, &spec)
                        .await
                        .inspect_err(|e| error!(collection = %kind, error = %e, "Error initializing collection"))?;
                    debug!(
                        collection = %kind,
                        partition_key = %spec.partition_key_path,
                        "Collection ensured to exist"
                    );
                }
                info!(database = %self.database, backend = %self.client.describe(), "Store provisioned");
                Ok::<(), StoreError>(())
            })
            .await
            .map(|_| ())
    }

    /// Accessor for one collection; fails if provisioning never succeeded
    pub fn collection(&self, kind: CollectionKind) -> AdapterResult<Collection> {
        if !self.is_ready() {
            return Err(AdapterError::Configuration(format!(
                "collection '{}' requested before database '{}' was provisioned",
                kind, self.database
            )));
        }
        Ok(Collection {
            client: Arc::clone(&self.client),
            database: self.database.clone(),
            kind,
        })
    }

    /// Accessor keyed by logical name (`users`, `threads`, `steps`, `elements`)
    pub fn collection_named(&self, name: &str) -> AdapterResult<Collection> {
        self.collection(name.parse()?)
    }

    pub fn describe(&self) -> String {
        format!("{} - database: {}", self.client.describe(), self.database)
    }

    /// Release the client (best-effort)
    pub async fn close(&self) {
        match self.client.close().await {
            Ok(()) => info!(database = %self.database, "Store client closed"),
            Err(e) => error!(error = %e, "Error closing store client"),
        }
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("backend", &self.client.describe())
            .field("database", &self.database)
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// A handle bound to one collection of the provisioned database
#[derive(Clone)]
pub struct Collection {
    client: Arc<dyn DocumentStore>,
    database: String,
    kind: CollectionKind,
}

impl Collection {
    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub async fn read(&self, id: &str, partition_key: &str) -> StoreResult<Document> {
        self.client
            .read_item(&self.database, self.name(), id, partition_key)
            .await
    }

    pub async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        self.client.query_items(&self.database, self.name(), query).await
    }

    pub async fn create(&self, document: Document) -> StoreResult<Document> {
        self.client.create_item(&self.database, self.name(), document).await
    }

    pub async fn upsert(&self, document: Document) -> StoreResult<Document> {
        self.client.upsert_item(&self.database, self.name(), document).await
    }

    pub async fn delete(&self, id: &str, partition_key: &str) -> StoreResult<()> {
        self.client
            .delete_item(&self.database, self.name(), id, partition_key)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::implementations::MemoryDocumentStore;

    #[tokio::test]
    async fn test_collection_requires_provisioning() {
        let handle = StoreHandle::new(Arc::new(MemoryDocumentStore::new()), "db");
        let err = handle.collection(CollectionKind::Steps).err().unwrap();
        assert!(matches!(err, AdapterError::Configuration(_)));

        handle.ensure_ready().await.unwrap();
        assert_eq!(handle.collection(CollectionKind::Steps).unwrap().name(), "steps");
    }

    #[tokio::test]
    async fn test_ensure_ready_is_idempotent() {
        let store = Arc::new(MemoryDocumentStore::new());
        let handle = StoreHandle::new(store.clone(), "db");
        handle.ensure_ready().await.unwrap();
        handle.ensure_ready().await.unwrap();

        // Provisioning again on a fresh handle keeps existing data
        let users = handle.collection_named("users").unwrap();
        let Some(doc) = serde_json::json!({"id": "alice"}).as_object().cloned() else {
            unreachable!()
        };
        users.create(doc).await.unwrap();

        let second = StoreHandle::new(store.clone(), "db");
        second.ensure_ready().await.unwrap();
        assert_eq!(store.document_count("db", "users"), 1);
    }

    #[tokio::test]
    async fn test_failed_provisioning_can_retry() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.set_offline(true);
        let handle = StoreHandle::new(store.clone(), "db");

        let err = handle.ensure_ready().await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(!handle.is_ready());

        store.set_offline(false);
        handle.ensure_ready().await.unwrap();
        assert!(handle.is_ready());
    }

    #[test]
    fn test_collection_kind_layout() {
        assert_eq!(CollectionKind::Users.partition_key_path(), "/id");
        assert_eq!(CollectionKind::Threads.partition_key_path(), "/id");
        assert_eq!(CollectionKind::Steps.partition_key_path(), "/threadId");
        assert_eq!(CollectionKind::Elements.partition_key_path(), "/threadId");
        assert!("widgets".parse::<CollectionKind>().is_err());
    }
}
