//! Similarity retrieval over an indexed collection.

use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::{debug, error, info, warn};

use crate::config::RagConfig;
use crate::document::{MetadataFilter, RetrievalResult};
use crate::embedding::{EmbeddingProvider, normalize};
use crate::error::{RagError, Result};
use crate::metric::DistanceMetric;
use crate::vectorstore::VectorStore;

/// Answers nearest-neighbour queries against one collection.
///
/// The retriever only reads. Several retrievers may share a store and run
/// concurrently.
///
/// # Example
///
/// ```rust,ignore
/// use medsim_rag::Retriever;
///
/// let retriever = Retriever::builder()
///     .config(config)
///     .embedding_provider(embedder)
///     .vector_store(store)
///     .build()?;
///
/// for hit in retriever.retrieve("fever and neck stiffness", 4, None).await? {
///     println!("[{}#{}] {:.3}", hit.source_id, hit.chunk_index, hit.score);
/// }
/// ```
pub struct Retriever {
    collection: String,
    top_k: usize,
    sample_scan_limit: usize,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
}

impl Retriever {
    /// Create a new [`RetrieverBuilder`].
    pub fn builder() -> RetrieverBuilder {
        RetrieverBuilder::default()
    }

    /// Name of the collection queried.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Result count used by [`retrieve_default`](Self::retrieve_default).
    pub fn default_top_k(&self) -> usize {
        self.top_k
    }

    /// Return up to `top_k` chunks closest to `query`, closest first.
    ///
    /// With `source_id` set, only chunks of that document are considered. A
    /// collection that has not been created yet yields no results.
    ///
    /// # Errors
    ///
    /// [`RagError::Config`] when `top_k` is zero. Embedding and store failures
    /// are propagated.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        source_id: Option<&str>,
    ) -> Result<Vec<RetrievalResult>> {
        if top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }

        let mut embedding = self.embedding_provider.embed(query).await.inspect_err(|e| {
            error!(provider = self.embedding_provider.name(), error = %e, "query embedding failed");
        })?;
        normalize(&mut embedding);

        let filter = source_id.map(MetadataFilter::source).unwrap_or_default();
        let matches = self
            .vector_store
            .query(&self.collection, &embedding, top_k, &filter)
            .await
            .inspect_err(|e| {
                error!(collection = %self.collection, error = %e, "vector store query failed");
            })?;

        info!(
            collection = %self.collection,
            top_k,
            source_id,
            result_count = matches.len(),
            "query completed"
        );
        Ok(matches.into_iter().map(RetrievalResult::from).collect())
    }

    /// [`retrieve`](Self::retrieve) with the configured default `top_k`.
    pub async fn retrieve_default(
        &self,
        query: &str,
        source_id: Option<&str>,
    ) -> Result<Vec<RetrievalResult>> {
        self.retrieve(query, self.top_k, source_id).await
    }

    /// Pick a random indexed case.
    ///
    /// Draws uniformly among the first chunks found in a bounded metadata
    /// scan. Returns `None` when nothing is indexed or the store fails; store
    /// failures are logged and not returned.
    pub async fn sample_source_id(&self) -> Option<String> {
        let rows = match self
            .vector_store
            .get(&self.collection, &MetadataFilter::first_chunks(), self.sample_scan_limit)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(collection = %self.collection, error = %e, "case sampling failed");
                return None;
            }
        };

        let picked = rows.choose(&mut rand::thread_rng()).map(|m| m.source_id.clone());
        debug!(collection = %self.collection, scanned = rows.len(), ?picked, "sampled case");
        picked
    }

    /// Metric of the underlying collection, or `None` if it does not exist.
    pub async fn metric(&self) -> Result<Option<DistanceMetric>> {
        self.vector_store.metric(&self.collection).await
    }

    /// Number of indexed chunks in the collection.
    pub async fn count(&self) -> Result<usize> {
        self.vector_store.count(&self.collection).await
    }
}

/// Builder for constructing a [`Retriever`].
///
/// `embedding_provider` and `vector_store` are required. Everything else falls
/// back to the config, or to [`RagConfig::default`] without one.
#[derive(Default)]
pub struct RetrieverBuilder {
    config: Option<RagConfig>,
    collection: Option<String>,
    top_k: Option<usize>,
    sample_scan_limit: Option<usize>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
}

impl RetrieverBuilder {
    /// Take collection, default `top_k` and scan limit from `config`.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the collection name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    /// Set the default result count.
    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    /// Set how many metadata rows [`Retriever::sample_source_id`] scans.
    pub fn sample_scan_limit(mut self, limit: usize) -> Self {
        self.sample_scan_limit = Some(limit);
        self
    }

    /// Set the embedding provider. Must match the one used for indexing.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Build the [`Retriever`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required field is missing or the
    /// default `top_k` is zero.
    pub fn build(self) -> Result<Retriever> {
        let config = self.config.unwrap_or_default();
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::Config("vector_store is required".to_string()))?;
        let top_k = self.top_k.unwrap_or(config.top_k);
        if top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }

        Ok(Retriever {
            collection: self.collection.unwrap_or(config.collection),
            top_k,
            sample_scan_limit: self.sample_scan_limit.unwrap_or(config.sample_scan_limit),
            embedding_provider,
            vector_store,
        })
    }
}
