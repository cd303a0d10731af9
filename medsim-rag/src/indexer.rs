//! Indexing pipeline: chunk → batch → embed → store.
//!
//! The [`Indexer`] turns a stream of [`Document`]s into [`IndexedRecord`]s.
//! Chunks are buffered into batches of at most `batch_size`; each batch costs
//! one embedding call and one store write, which bounds peak memory no matter
//! how large the input stream is.
//!
//! # Example
//!
//! ```rust,ignore
//! use medsim_rag::{FixedSizeChunker, Indexer, LocalVectorStore};
//!
//! let indexer = Indexer::builder()
//!     .collection("pmc_casereport")
//!     .embedding_provider(Arc::new(embedder))
//!     .vector_store(Arc::new(LocalVectorStore::open("data/index").await?))
//!     .chunker(Arc::new(FixedSizeChunker::new(1000, 150)?))
//!     .build()?;
//!
//! let report = indexer.index(documents).await?;
//! ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::chunking::{Chunker, FixedSizeChunker};
use crate::config::RagConfig;
use crate::document::{Chunk, ChunkMetadata, Document, IndexedRecord};
use crate::embedding::{EmbeddingProvider, normalize};
use crate::error::{RagError, Result};
use crate::ids::{RecordIdStrategy, SaltedRecordIds};
use crate::metric::DistanceMetric;
use crate::vectorstore::VectorStore;

/// Default number of chunks per embedding call and store write.
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// Counters describing one [`Indexer::index`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    /// Documents consumed from the input stream.
    pub documents: usize,
    /// Chunks embedded and committed.
    pub chunks: usize,
    /// Batches flushed to the store.
    pub batches: usize,
}

/// A chunk waiting for its embedding.
struct PendingChunk {
    id: String,
    chunk: Chunk,
    row_index: usize,
}

/// Writes document chunks into one collection of a [`VectorStore`].
///
/// Construct one via [`Indexer::builder()`].
pub struct Indexer {
    collection: String,
    batch_size: usize,
    metric: DistanceMetric,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    ids: Option<Arc<dyn RecordIdStrategy>>,
}

impl Indexer {
    /// Create a new [`IndexerBuilder`].
    pub fn builder() -> IndexerBuilder {
        IndexerBuilder::default()
    }

    /// Name of the target collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Maximum chunks per batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Create the target collection if it does not exist yet.
    pub async fn ensure_collection(&self) -> Result<()> {
        let dimensions = self.embedding_provider.dimensions();
        self.vector_store
            .create_collection(&self.collection, dimensions, self.metric)
            .await
            .inspect_err(|e| {
                error!(collection = %self.collection, error = %e, "failed to create collection");
            })
    }

    /// Delete and recreate the target collection, discarding every record.
    ///
    /// Must not run concurrently with indexing or retrieval on the same
    /// collection.
    pub async fn reset(&self) -> Result<()> {
        self.vector_store.delete_collection(&self.collection).await.inspect_err(|e| {
            error!(collection = %self.collection, error = %e, "failed to delete collection");
        })?;
        self.ensure_collection().await?;
        info!(collection = %self.collection, "collection reset");
        Ok(())
    }

    /// Chunk, embed and store every document in `documents`.
    ///
    /// Each document gets a row index (0, 1, ... within this call) that feeds
    /// into its record ids. Writes are append-only with no deduplication:
    /// unless a fixed strategy was set with
    /// [`IndexerBuilder::record_ids`], every call salts its ids with a fresh
    /// run id, so indexing the same rows again without
    /// [`reset`](Self::reset) stores duplicate chunks under new ids.
    ///
    /// # Errors
    ///
    /// Returns the first embedding or store error. The batch being flushed
    /// is lost; batches flushed before it stay committed.
    pub async fn index<I>(&self, documents: I) -> Result<IndexReport>
    where
        I: IntoIterator<Item = Document>,
    {
        self.ensure_collection().await?;
        let ids = self.run_ids();

        let mut report = IndexReport::default();
        let mut pending: Vec<PendingChunk> = Vec::with_capacity(self.batch_size);

        for (row_index, document) in documents.into_iter().enumerate() {
            report.documents += 1;
            for chunk in self.chunker.chunk(&document) {
                let id = ids.record_id(&chunk.source_id, row_index, chunk.chunk_index);
                pending.push(PendingChunk { id, chunk, row_index });

                if pending.len() >= self.batch_size {
                    let batch = std::mem::replace(&mut pending, Vec::with_capacity(self.batch_size));
                    report.chunks += self.flush(batch).await?;
                    report.batches += 1;
                }
            }
        }

        if !pending.is_empty() {
            report.chunks += self.flush(pending).await?;
            report.batches += 1;
        }

        info!(
            collection = %self.collection,
            documents = report.documents,
            chunks = report.chunks,
            batches = report.batches,
            "indexing completed"
        );
        Ok(report)
    }

    /// Id strategy for one `index` call.
    fn run_ids(&self) -> Arc<dyn RecordIdStrategy> {
        match &self.ids {
            Some(ids) => ids.clone(),
            None => {
                let run = Uuid::new_v4().simple().to_string();
                debug!(collection = %self.collection, %run, "salting record ids");
                Arc::new(SaltedRecordIds::new(run))
            }
        }
    }

    /// Embed one batch and append it to the store. Returns the records written.
    async fn flush(&self, batch: Vec<PendingChunk>) -> Result<usize> {
        let provider = self.embedding_provider.name().to_string();
        let embeddings = {
            let texts: Vec<&str> = batch.iter().map(|p| p.chunk.text.as_str()).collect();
            self.embedding_provider.embed_batch(&texts).await.inspect_err(|e| {
                error!(%provider, batch_size = texts.len(), error = %e, "embedding failed, batch dropped");
            })?
        };

        if embeddings.len() != batch.len() {
            error!(%provider, expected = batch.len(), got = embeddings.len(), "embedding count mismatch");
            return Err(RagError::embedding(
                &provider,
                format!("expected {} embeddings, got {}", batch.len(), embeddings.len()),
            ));
        }

        let records: Vec<IndexedRecord> = batch
            .into_iter()
            .zip(embeddings)
            .map(|(pending, mut embedding)| {
                normalize(&mut embedding);
                IndexedRecord {
                    id: pending.id,
                    metadata: ChunkMetadata {
                        source_id: pending.chunk.source_id,
                        chunk_index: pending.chunk.chunk_index,
                        row_index: pending.row_index,
                    },
                    text: pending.chunk.text,
                    embedding,
                }
            })
            .collect();

        let count = records.len();
        self.vector_store.add(&self.collection, records).await.inspect_err(|e| {
            error!(collection = %self.collection, error = %e, "store write failed, batch dropped");
        })?;
        debug!(collection = %self.collection, count, "flushed batch");
        Ok(count)
    }
}

/// Builder for constructing an [`Indexer`].
///
/// `embedding_provider` and `vector_store` are required. The chunker defaults
/// to a [`FixedSizeChunker`] built from the config (or 1000/150 without one).
/// Without a record id strategy each `index` call uses a
/// [`SaltedRecordIds`] with a fresh run id.
#[derive(Default)]
pub struct IndexerBuilder {
    config: Option<RagConfig>,
    collection: Option<String>,
    batch_size: Option<usize>,
    metric: Option<DistanceMetric>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    ids: Option<Arc<dyn RecordIdStrategy>>,
}

impl IndexerBuilder {
    /// Take collection, batch size, metric and chunking from `config`.
    /// Explicit setters win over the config.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the target collection name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    /// Set the maximum chunks per batch.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Set the metric used when the collection has to be created.
    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = Some(metric);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Use one fixed record id strategy for every `index` call.
    ///
    /// With [`SequentialRecordIds`](crate::SequentialRecordIds) ids are
    /// reproducible, and re-indexing rows already in the collection fails on
    /// the duplicate ids.
    pub fn record_ids(mut self, ids: Arc<dyn RecordIdStrategy>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Build the [`Indexer`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required field is missing, the batch
    /// size is zero, or the chunking parameters are invalid.
    pub fn build(self) -> Result<Indexer> {
        let config = self.config.unwrap_or_default();
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::Config("vector_store is required".to_string()))?;
        let batch_size = self.batch_size.unwrap_or(config.batch_size);
        if batch_size == 0 {
            return Err(RagError::Config("batch_size must be greater than zero".to_string()));
        }
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(FixedSizeChunker::new(config.chunk_size, config.chunk_overlap)?),
        };

        Ok(Indexer {
            collection: self.collection.unwrap_or(config.collection),
            batch_size,
            metric: self.metric.unwrap_or(config.metric),
            embedding_provider,
            vector_store,
            chunker,
            ids: self.ids,
        })
    }
}
