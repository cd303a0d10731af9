//! Persistent vector store on the local filesystem.
//!
//! Layout under the store root, one directory per collection:
//!
//! ```text
//! <root>/<collection>/collection.json   manifest (name, dimensions, metric, version)
//! <root>/<collection>/records.jsonl     one IndexedRecord per line, append-only
//! ```
//!
//! The manifest is replaced atomically (temp file + rename). Records are only
//! ever appended, so a crash can at worst leave a truncated final line, which
//! is skipped on the next load. A failed append is truncated back to the last
//! committed byte, and bytes past that point are discarded before the next
//! append.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::collection::{Collection, CollectionManifest, MANIFEST_VERSION};
use crate::document::{ChunkMetadata, IndexedRecord, MetadataFilter, StoreMatch};
use crate::error::{RagError, Result};
use crate::metric::DistanceMetric;
use crate::vectorstore::VectorStore;

const BACKEND: &str = "Local";
const MANIFEST_FILE: &str = "collection.json";
const RECORDS_FILE: &str = "records.jsonl";

/// A [`VectorStore`] persisted as JSON files below a root directory.
///
/// Collections are read from disk the first time they are touched and then
/// served from memory. Several stores may read the same directory, but only
/// one process should write a collection at a time.
///
/// # Example
///
/// ```rust,ignore
/// use medsim_rag::{DistanceMetric, LocalVectorStore, VectorStore};
///
/// let store = LocalVectorStore::open("data/index").await?;
/// store.create_collection("pmc_casereport", 384, DistanceMetric::Cosine).await?;
/// ```
#[derive(Debug)]
pub struct LocalVectorStore {
    root: PathBuf,
    collections: RwLock<HashMap<String, Loaded>>,
}

/// A collection held in memory plus the length of its records file as of the
/// last successful append.
#[derive(Debug)]
struct Loaded {
    data: Collection,
    committed: u64,
}

impl LocalVectorStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            error!(path = %root.display(), error = %e, "failed to create index directory");
            RagError::store(BACKEND, format!("failed to create '{}': {e}", root.display()))
        })?;
        debug!(path = %root.display(), "opened local vector store");
        Ok(Self { root, collections: RwLock::new(HashMap::new()) })
    }

    /// Directory holding all collections.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(RagError::Config(format!(
                "invalid collection name '{name}': use ASCII letters, digits, '_', '-' or '.'"
            )));
        }
        Ok(self.root.join(name))
    }

    /// Make sure `name` is in memory if it exists on disk. Returns whether it exists.
    async fn ensure_loaded(&self, name: &str) -> Result<bool> {
        if self.collections.read().await.contains_key(name) {
            return Ok(true);
        }
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Ok(true);
        }
        match self.load(name).await? {
            Some(collection) => {
                collections.insert(name.to_string(), collection);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn load(&self, name: &str) -> Result<Option<Loaded>> {
        let dir = self.collection_dir(name)?;
        let manifest_path = dir.join(MANIFEST_FILE);
        if !fs::try_exists(&manifest_path).await.unwrap_or(false) {
            return Ok(None);
        }

        let bytes = fs::read(&manifest_path).await.map_err(|e| io_error("read", &manifest_path, e))?;
        let manifest: CollectionManifest = serde_json::from_slice(&bytes).map_err(|e| {
            RagError::store(
                BACKEND,
                format!("failed to decode manifest '{}': {e}", manifest_path.display()),
            )
        })?;
        if manifest.version > MANIFEST_VERSION {
            return Err(RagError::store(
                BACKEND,
                format!(
                    "collection '{name}' has format version {}, this build reads up to {MANIFEST_VERSION}",
                    manifest.version
                ),
            ));
        }

        let mut collection = Collection::new(manifest);
        let mut committed = 0;
        let records_path = dir.join(RECORDS_FILE);
        if fs::try_exists(&records_path).await.unwrap_or(false) {
            let content =
                fs::read_to_string(&records_path).await.map_err(|e| io_error("read", &records_path, e))?;
            let (records, torn) = parse_records(&content, &records_path)?;
            committed = if torn || !(content.is_empty() || content.ends_with('\n')) {
                rewrite_records(&records_path, &records).await?
            } else {
                content.len() as u64
            };
            collection.extend(records);
        }

        info!(collection = name, records = collection.len(), "loaded collection from disk");
        Ok(Some(Loaded { data: collection, committed }))
    }

    async fn write_manifest(&self, dir: &Path, manifest: &CollectionManifest) -> Result<()> {
        fs::create_dir_all(dir).await.map_err(|e| io_error("create", dir, e))?;
        let path = dir.join(MANIFEST_FILE);
        let tmp = path.with_extension("tmp");
        let json = serde_json::to_vec_pretty(manifest)?;
        fs::write(&tmp, json).await.map_err(|e| io_error("write", &tmp, e))?;
        fs::rename(&tmp, &path).await.map_err(|e| io_error("rename", &tmp, e))?;
        Ok(())
    }
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> RagError {
    error!(path = %path.display(), error = %e, "failed to {action}");
    RagError::store(BACKEND, format!("failed to {action} '{}': {e}", path.display()))
}

/// Decode a records file. A malformed final line is a torn append and is
/// skipped (the flag in the result is set); a malformed line anywhere else is
/// corruption.
fn parse_records(content: &str, path: &Path) -> Result<(Vec<IndexedRecord>, bool)> {
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    let mut records = Vec::with_capacity(lines.len());
    let mut torn = false;
    for (i, line) in lines.iter().enumerate() {
        match serde_json::from_str::<IndexedRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) if i + 1 == lines.len() => {
                warn!(path = %path.display(), error = %e, "skipping truncated trailing record");
                torn = true;
            }
            Err(e) => {
                return Err(RagError::store(
                    BACKEND,
                    format!("corrupt record on line {} of '{}': {e}", i + 1, path.display()),
                ));
            }
        }
    }
    Ok((records, torn))
}

fn encode_records(records: &[IndexedRecord]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for record in records {
        serde_json::to_writer(&mut buf, record)?;
        buf.push(b'\n');
    }
    Ok(buf)
}

/// Replace a records file with `records`, dropping a torn tail so later
/// appends start on a fresh line. Returns the new file length.
async fn rewrite_records(path: &Path, records: &[IndexedRecord]) -> Result<u64> {
    let buf = encode_records(records)?;
    let len = buf.len() as u64;
    let tmp = path.with_extension("jsonl.tmp");
    fs::write(&tmp, buf).await.map_err(|e| io_error("write", &tmp, e))?;
    fs::rename(&tmp, path).await.map_err(|e| io_error("rename", &tmp, e))?;
    Ok(len)
}

/// Write `buf` at `offset` and make it durable.
async fn write_at(file: &mut fs::File, offset: u64, buf: &[u8]) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(offset)).await?;
    file.write_all(buf).await?;
    file.flush().await?;
    file.sync_data().await
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        if self.ensure_loaded(name).await? {
            return Ok(());
        }
        let dir = self.collection_dir(name)?;
        let manifest =
            CollectionManifest { name: name.to_string(), dimensions, metric, version: MANIFEST_VERSION };

        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Ok(());
        }
        self.write_manifest(&dir, &manifest).await?;
        collections.insert(name.to_string(), Loaded { data: Collection::new(manifest), committed: 0 });
        info!(collection = name, dimensions, %metric, "created collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let dir = self.collection_dir(name)?;
        let mut collections = self.collections.write().await;
        collections.remove(name);
        if fs::try_exists(&dir).await.unwrap_or(false) {
            fs::remove_dir_all(&dir).await.map_err(|e| io_error("remove", &dir, e))?;
        }
        info!(collection = name, "deleted collection");
        Ok(())
    }

    async fn add(&self, collection: &str, records: Vec<IndexedRecord>) -> Result<()> {
        if !self.ensure_loaded(collection).await? {
            return Err(RagError::store(BACKEND, format!("collection '{collection}' does not exist")));
        }
        let path = self.collection_dir(collection)?.join(RECORDS_FILE);

        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| {
            RagError::store(BACKEND, format!("collection '{collection}' was deleted concurrently"))
        })?;
        store.data.validate(BACKEND, &records)?;
        let buf = encode_records(&records)?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .await
            .map_err(|e| io_error("open", &path, e))?;
        let on_disk = file.metadata().await.map_err(|e| io_error("stat", &path, e))?.len();
        if on_disk < store.committed {
            return Err(RagError::store(
                BACKEND,
                format!(
                    "'{}' is shorter than its committed length ({on_disk} < {} bytes)",
                    path.display(),
                    store.committed
                ),
            ));
        }
        if on_disk > store.committed {
            warn!(
                collection,
                discarded = on_disk - store.committed,
                "discarding uncommitted bytes at end of records file"
            );
        }

        if let Err(e) = write_at(&mut file, store.committed, &buf).await {
            if let Err(rollback) = file.set_len(store.committed).await {
                warn!(collection, error = %rollback, "failed to roll back partial append");
            }
            return Err(io_error("append to", &path, e));
        }
        let end = store.committed + buf.len() as u64;
        if on_disk > end {
            file.set_len(end).await.map_err(|e| io_error("truncate", &path, e))?;
        }

        debug!(collection, added = records.len(), "appended records");
        store.committed = end;
        store.data.extend(records);
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<StoreMatch>> {
        if !self.ensure_loaded(collection).await? {
            return Ok(Vec::new());
        }
        let collections = self.collections.read().await;
        match collections.get(collection) {
            Some(store) => store.data.query(BACKEND, embedding, top_k, filter),
            None => Ok(Vec::new()),
        }
    }

    async fn get(
        &self,
        collection: &str,
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<ChunkMetadata>> {
        if !self.ensure_loaded(collection).await? {
            return Ok(Vec::new());
        }
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map(|c| c.data.metadata(filter, limit)).unwrap_or_default())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        if !self.ensure_loaded(collection).await? {
            return Ok(0);
        }
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map_or(0, |c| c.data.len()))
    }

    async fn metric(&self, collection: &str) -> Result<Option<DistanceMetric>> {
        if !self.ensure_loaded(collection).await? {
            return Ok(None);
        }
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map(|c| c.data.manifest.metric))
    }
}
