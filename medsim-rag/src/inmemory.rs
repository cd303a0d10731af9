//! In-memory vector store.
//!
//! [`InMemoryVectorStore`] keeps every collection in a `HashMap` behind a
//! `tokio::sync::RwLock`. Nothing is persisted, which makes it the store of
//! choice for tests and throwaway sessions.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::collection::{Collection, CollectionManifest, MANIFEST_VERSION};
use crate::document::{ChunkMetadata, IndexedRecord, MetadataFilter, StoreMatch};
use crate::error::{RagError, Result};
use crate::metric::DistanceMetric;
use crate::vectorstore::VectorStore;

const BACKEND: &str = "InMemory";

/// An in-memory [`VectorStore`].
///
/// # Example
///
/// ```rust,ignore
/// use medsim_rag::{DistanceMetric, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("cases", 384, DistanceMetric::Cosine).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.entry(name.to_string()).or_insert_with(|| {
            Collection::new(CollectionManifest {
                name: name.to_string(),
                dimensions,
                metric,
                version: MANIFEST_VERSION,
            })
        });
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn add(&self, collection: &str, records: Vec<IndexedRecord>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| {
            RagError::store(BACKEND, format!("collection '{collection}' does not exist"))
        })?;
        store.validate(BACKEND, &records)?;
        store.extend(records);
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<StoreMatch>> {
        let collections = self.collections.read().await;
        match collections.get(collection) {
            Some(store) => store.query(BACKEND, embedding, top_k, filter),
            None => Ok(Vec::new()),
        }
    }

    async fn get(
        &self,
        collection: &str,
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<ChunkMetadata>> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map(|c| c.metadata(filter, limit)).unwrap_or_default())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map_or(0, Collection::len))
    }

    async fn metric(&self, collection: &str) -> Result<Option<DistanceMetric>> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map(|c| c.manifest.metric))
    }
}
