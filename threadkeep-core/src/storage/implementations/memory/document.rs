//! In-memory DocumentStore implementation

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::storage::error::{StoreError, StoreResult};
use crate::storage::query::{apply_query, id_of, partition_key_of, stamp_system_fields};
use crate::storage::traits::{ContainerSpec, Document, DocumentStore, Query};

/// Kind of mutation recorded in the write log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Upsert,
    Delete,
}

/// One successful mutation, in the order the store applied it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub kind: WriteKind,
    pub container: String,
    pub id: String,
}

#[derive(Debug)]
struct MemoryContainer {
    spec: ContainerSpec,
    /// partition key -> id -> document
    partitions: BTreeMap<String, BTreeMap<String, Document>>,
}

impl MemoryContainer {
    fn new(spec: ContainerSpec) -> Self {
        Self {
            spec,
            partitions: BTreeMap::new(),
        }
    }
}

/// Partitioned in-memory document store for tests and embedding
///
/// Can be switched offline to exercise failure paths, and keeps a log of
/// every applied mutation.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    databases: Mutex<HashMap<String, HashMap<String, MemoryContainer>>>,
    writes: Mutex<Vec<WriteRecord>>,
    offline: AtomicBool,
    closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with `StoreError::Unavailable`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Mutations applied so far, oldest first
    pub fn write_log(&self) -> Vec<WriteRecord> {
        lock(&self.writes).clone()
    }

    pub fn clear_write_log(&self) {
        lock(&self.writes).clear();
    }

    /// Number of documents currently stored in a container
    pub fn document_count(&self, database: &str, container: &str) -> usize {
        lock(&self.databases)
            .get(database)
            .and_then(|db| db.get(container))
            .map(|c| c.partitions.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }

    fn record(&self, kind: WriteKind, container: &str, id: &str) {
        lock(&self.writes).push(WriteRecord {
            kind,
            container: container.to_string(),
            id: id.to_string(),
        });
    }

    /// Run `f` against one container, holding the store lock
    fn with_container<R>(
        &self,
        database: &str,
        container: &str,
        f: impl FnOnce(&mut MemoryContainer) -> StoreResult<R>,
    ) -> StoreResult<R> {
        self.check_available()?;
        let mut databases = lock(&self.databases);
        let c = databases
            .get_mut(database)
            .and_then(|db| db.get_mut(container))
            .ok_or_else(|| StoreError::UnknownContainer {
                database: database.to_string(),
                container: container.to_string(),
            })?;
        f(c)
    }

    fn keys_for(c: &MemoryContainer, document: &Document) -> StoreResult<(String, String)> {
        let id = id_of(document).ok_or_else(|| StoreError::MissingId {
            container: c.spec.name.clone(),
        })?;
        let pk = partition_key_of(document, &c.spec).ok_or_else(|| StoreError::MissingPartitionKey {
            container: c.spec.name.clone(),
            path: c.spec.partition_key_path.clone(),
        })?;
        Ok((id, pk))
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create_database_if_not_exists(&self, database: &str) -> StoreResult<()> {
        self.check_available()?;
        lock(&self.databases).entry(database.to_string()).or_default();
        Ok(())
    }

    async fn create_container_if_not_exists(
        &self,
        database: &str,
        spec: &ContainerSpec,
    ) -> StoreResult<()> {
        self.check_available()?;
        let mut databases = lock(&self.databases);
        let db = databases
            .get_mut(database)
            .ok_or_else(|| StoreError::UnknownContainer {
                database: database.to_string(),
                container: spec.name.clone(),
            })?;
        db.entry(spec.name.clone())
            .or_insert_with(|| MemoryContainer::new(spec.clone()));
        Ok(())
    }

    async fn read_item(
        &self,
        database: &str,
        container: &str,
        id: &str,
        partition_key: &str,
    ) -> StoreResult<Document> {
        self.with_container(database, container, |c| {
            c.partitions
                .get(partition_key)
                .and_then(|p| p.get(id))
                .cloned()
                .ok_or_else(|| StoreError::NotFound {
                    container: container.to_string(),
                    id: id.to_string(),
                })
        })
    }

    async fn query_items(
        &self,
        database: &str,
        container: &str,
        query: &Query,
    ) -> StoreResult<Vec<Document>> {
        self.with_container(database, container, |c| {
            let candidates: Vec<Document> = match &query.partition_key {
                Some(pk) => c
                    .partitions
                    .get(pk)
                    .map(|p| p.values().cloned().collect())
                    .unwrap_or_default(),
                None => c
                    .partitions
                    .values()
                    .flat_map(|p| p.values().cloned())
                    .collect(),
            };
            Ok(apply_query(candidates, query))
        })
    }

    async fn create_item(
        &self,
        database: &str,
        container: &str,
        mut document: Document,
    ) -> StoreResult<Document> {
        let id = self.with_container(database, container, |c| {
            let (id, pk) = Self::keys_for(c, &document)?;
            let partition = c.partitions.entry(pk).or_default();
            if partition.contains_key(&id) {
                return Err(StoreError::Conflict {
                    container: container.to_string(),
                    id,
                });
            }
            stamp_system_fields(&mut document, None);
            partition.insert(id.clone(), document.clone());
            Ok(id)
        })?;
        self.record(WriteKind::Create, container, &id);
        Ok(document)
    }

    async fn upsert_item(
        &self,
        database: &str,
        container: &str,
        mut document: Document,
    ) -> StoreResult<Document> {
        let id = self.with_container(database, container, |c| {
            let (id, pk) = Self::keys_for(c, &document)?;
            let partition = c.partitions.entry(pk).or_default();
            stamp_system_fields(&mut document, partition.get(&id));
            partition.insert(id.clone(), document.clone());
            Ok(id)
        })?;
        self.record(WriteKind::Upsert, container, &id);
        Ok(document)
    }

    async fn delete_item(
        &self,
        database: &str,
        container: &str,
        id: &str,
        partition_key: &str,
    ) -> StoreResult<()> {
        self.with_container(database, container, |c| {
            let removed = c
                .partitions
                .get_mut(partition_key)
                .and_then(|p| p.remove(id));
            match removed {
                Some(_) => Ok(()),
                None => Err(StoreError::NotFound {
                    container: container.to_string(),
                    id: id.to_string(),
                }),
            }
        })?;
        self.record(WriteKind::Delete, container, id);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
