//! Filesystem-backed DocumentStore
//!
//! One JSON file per document, sharded by partition:
//! `root/{database}/{container}/{hex(partition)}/{hex(id)}.json`.
//! Each container directory holds a `container.json` descriptor with its
//! partition key path. Names are hex-encoded so arbitrary ids are safe
//! file names; keys whose encoding would exceed the platform's name limit
//! are stored under `sha256-{hash}` instead.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::storage::error::{StoreError, StoreResult};
use crate::storage::helper::content_hash;
use crate::storage::query::{apply_query, id_of, partition_key_of, stamp_system_fields};
use crate::storage::traits::{ContainerSpec, Document, DocumentStore, Query};

const DESCRIPTOR_FILE: &str = "container.json";

/// Longest hex name kept as-is; leaves room for the temp-file suffix
/// within a 255-byte file name
const MAX_ENCODED_NAME: usize = 200;

/// File-system name for an id or partition key
fn encode_name(key: &str) -> String {
    let encoded = hex::encode(key);
    if encoded.len() <= MAX_ENCODED_NAME {
        encoded
    } else {
        format!("sha256-{}", content_hash(key.as_bytes()))
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerDescriptor {
    name: String,
    partition_key_path: String,
}

/// Document store persisted as JSON files under a root directory
#[derive(Debug)]
pub struct FsDocumentStore {
    root: PathBuf,
    specs: Mutex<HashMap<(String, String), ContainerSpec>>,
    closed: AtomicBool,
}

impl FsDocumentStore {
    /// Create a store rooted at the given directory (created on demand)
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            specs: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_dir(&self, database: &str, container: &str) -> PathBuf {
        self.root.join(database).join(container)
    }

    fn partition_dir(&self, database: &str, container: &str, partition_key: &str) -> PathBuf {
        self.container_dir(database, container)
            .join(encode_name(partition_key))
    }

    /// Get the filesystem path for a document
    pub fn path_for(&self, database: &str, container: &str, id: &str, partition_key: &str) -> PathBuf {
        self.partition_dir(database, container, partition_key)
            .join(format!("{}.json", encode_name(id)))
    }

    fn check_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    /// Container spec, from cache or from its on-disk descriptor
    async fn spec(&self, database: &str, container: &str) -> StoreResult<ContainerSpec> {
        self.check_open()?;
        let key = (database.to_string(), container.to_string());
        let cached = self
            .specs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        if let Some(spec) = cached {
            return Ok(spec);
        }

        let descriptor_path = self.container_dir(database, container).join(DESCRIPTOR_FILE);
        if !fs::try_exists(&descriptor_path).await? {
            return Err(StoreError::UnknownContainer {
                database: database.to_string(),
                container: container.to_string(),
            });
        }
        let descriptor: ContainerDescriptor = serde_json::from_slice(&fs::read(&descriptor_path).await?)?;
        let spec = ContainerSpec::new(descriptor.name, descriptor.partition_key_path);
        self.specs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, spec.clone());
        Ok(spec)
    }

    async fn read_path(path: &Path) -> StoreResult<Option<Document>> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the document to a fresh temp file next to `path`
    async fn write_temp(path: &Path, document: &Document) -> StoreResult<PathBuf> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&serde_json::to_vec(document)?).await?;
        file.sync_all().await?;
        Ok(temp_path)
    }

    /// Write atomically using a temp file, replacing any existing document
    async fn write_path(path: &Path, document: &Document) -> StoreResult<()> {
        let temp_path = Self::write_temp(path, document).await?;
        fs::rename(&temp_path, path).await?;
        Ok(())
    }

    /// Publish the document only if `path` does not exist yet.
    /// Returns false when another writer got there first.
    async fn write_new_path(path: &Path, document: &Document) -> StoreResult<bool> {
        let temp_path = Self::write_temp(path, document).await?;
        let linked = fs::hard_link(&temp_path, path).await;
        let cleanup = fs::remove_file(&temp_path).await;
        match linked {
            Ok(()) => {
                cleanup?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Every document file in one partition directory
    async fn read_partition(dir: &Path) -> StoreResult<Vec<Document>> {
        let mut documents = Vec::new();
        if !fs::try_exists(dir).await? {
            return Ok(documents);
        }
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(document) = Self::read_path(&path).await? {
                    documents.push(document);
                }
            }
        }
        // Directory order is unspecified; sort by file name for stable results
        documents.sort_by(|a, b| id_of(a).cmp(&id_of(b)));
        Ok(documents)
    }

    fn keys_for(spec: &ContainerSpec, document: &Document) -> StoreResult<(String, String)> {
        let id = id_of(document).ok_or_else(|| StoreError::MissingId {
            container: spec.name.clone(),
        })?;
        let pk = partition_key_of(document, spec).ok_or_else(|| StoreError::MissingPartitionKey {
            container: spec.name.clone(),
            path: spec.partition_key_path.clone(),
        })?;
        Ok((id, pk))
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn create_database_if_not_exists(&self, database: &str) -> StoreResult<()> {
        self.check_open()?;
        fs::create_dir_all(self.root.join(database)).await?;
        Ok(())
    }

    async fn create_container_if_not_exists(
        &self,
        database: &str,
        spec: &ContainerSpec,
    ) -> StoreResult<()> {
        self.check_open()?;
        let dir = self.container_dir(database, &spec.name);
        let descriptor_path = dir.join(DESCRIPTOR_FILE);
        if fs::try_exists(&descriptor_path).await? {
            return Ok(());
        }
        fs::create_dir_all(&dir).await?;
        let descriptor = ContainerDescriptor {
            name: spec.name.clone(),
            partition_key_path: spec.partition_key_path.clone(),
        };
        fs::write(&descriptor_path, serde_json::to_vec_pretty(&descriptor)?).await?;
        Ok(())
    }

    async fn read_item(
        &self,
        database: &str,
        container: &str,
        id: &str,
        partition_key: &str,
    ) -> StoreResult<Document> {
        self.spec(database, container).await?;
        Self::read_path(&self.path_for(database, container, id, partition_key))
            .await?
            .ok_or_else(|| StoreError::NotFound {
                container: container.to_string(),
                id: id.to_string(),
            })
    }

    async fn query_items(
        &self,
        database: &str,
        container: &str,
        query: &Query,
    ) -> StoreResult<Vec<Document>> {
        self.spec(database, container).await?;
        let candidates = match &query.partition_key {
            Some(pk) => Self::read_partition(&self.partition_dir(database, container, pk)).await?,
            None => {
                let mut all = Vec::new();
                let mut partitions = Vec::new();
                let mut entries = fs::read_dir(self.container_dir(database, container)).await?;
                while let Some(entry) = entries.next_entry().await? {
                    if entry.file_type().await?.is_dir() {
                        partitions.push(entry.path());
                    }
                }
                partitions.sort();
                for dir in partitions {
                    all.extend(Self::read_partition(&dir).await?);
                }
                all
            }
        };
        Ok(apply_query(candidates, query))
    }

    async fn create_item(
        &self,
        database: &str,
        container: &str,
        mut document: Document,
    ) -> StoreResult<Document> {
        let spec = self.spec(database, container).await?;
        let (id, pk) = Self::keys_for(&spec, &document)?;
        let path = self.path_for(database, container, &id, &pk);
        stamp_system_fields(&mut document, None);
        if !Self::write_new_path(&path, &document).await? {
            return Err(StoreError::Conflict {
                container: container.to_string(),
                id,
            });
        }
        Ok(document)
    }

    async fn upsert_item(
        &self,
        database: &str,
        container: &str,
        mut document: Document,
    ) -> StoreResult<Document> {
        let spec = self.spec(database, container).await?;
        let (id, pk) = Self::keys_for(&spec, &document)?;
        let path = self.path_for(database, container, &id, &pk);
        let previous = Self::read_path(&path).await?;
        stamp_system_fields(&mut document, previous.as_ref());
        Self::write_path(&path, &document).await?;
        Ok(document)
    }

    async fn delete_item(
        &self,
        database: &str,
        container: &str,
        id: &str,
        partition_key: &str,
    ) -> StoreResult<()> {
        self.spec(database, container).await?;
        let path = self.path_for(database, container, id, partition_key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                container: container.to_string(),
                id: id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        format!("fs:{}", self.root.display())
    }

    async fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
