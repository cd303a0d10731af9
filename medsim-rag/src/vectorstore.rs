//! Vector store trait for storing and searching chunk embeddings.

use async_trait::async_trait;

use crate::document::{ChunkMetadata, IndexedRecord, MetadataFilter, StoreMatch};
use crate::error::Result;
use crate::metric::DistanceMetric;

/// A storage backend for indexed chunks with similarity search.
///
/// Implementations manage named collections of [`IndexedRecord`]s. Writes are
/// append-only: a record is never updated in place, and rebuilding means
/// deleting and recreating the collection.
///
/// Reads against a collection that does not exist behave like reads against an
/// empty one. Writes to a missing collection are an error.
///
/// # Example
///
/// ```rust,ignore
/// use medsim_rag::{DistanceMetric, InMemoryVectorStore, MetadataFilter, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("cases", 384, DistanceMetric::Cosine).await?;
/// store.add("cases", records).await?;
/// let hits = store.query("cases", &query_embedding, 4, &MetadataFilter::any()).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection. No-op if it already exists; the existing
    /// metric and dimensionality are kept.
    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<()>;

    /// Delete a named collection and all its records. No-op if missing.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Append records to a collection.
    ///
    /// The batch is validated as a whole before anything is written: every
    /// embedding must match the collection's dimensionality and no id may
    /// already exist.
    async fn add(&self, collection: &str, records: Vec<IndexedRecord>) -> Result<()>;

    /// Return up to `top_k` records matching `filter`, nearest first.
    ///
    /// Records at equal distance keep insertion order.
    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<StoreMatch>>;

    /// Return the metadata of up to `limit` records matching `filter`, in
    /// insertion order.
    async fn get(
        &self,
        collection: &str,
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<ChunkMetadata>>;

    /// Number of records in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// The metric a collection was created with, if it exists.
    async fn metric(&self, collection: &str) -> Result<Option<DistanceMetric>>;
}
