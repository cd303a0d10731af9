//! Configuration for chunking, indexing and retrieval.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::indexer::DEFAULT_BATCH_SIZE;
use crate::metric::DistanceMetric;

/// Default Ollama endpoint for the embedding model.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Vector length of the default embedding model (all-MiniLM-L6-v2).
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

/// Configuration parameters for the indexing and retrieval pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Directory the persistent vector store lives in.
    pub persist_dir: PathBuf,
    /// Name of the collection holding the case-report chunks.
    pub collection: String,
    /// Embedding model identifier passed to the embedding backend.
    pub embedding_model: String,
    /// Vector length produced by `embedding_model`. New collections are
    /// created with it, so it must match the model.
    pub embedding_dimensions: usize,
    /// Base URL of the embedding backend.
    pub embedding_endpoint: String,
    /// Chunk window size in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Default number of results per query.
    pub top_k: usize,
    /// Maximum number of chunks embedded and written per batch.
    pub batch_size: usize,
    /// Maximum metadata rows scanned when sampling a random case.
    pub sample_scan_limit: usize,
    /// Distance metric for newly created collections.
    pub metric: DistanceMetric,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            persist_dir: PathBuf::from("data/index"),
            collection: "pmc_casereport".to_string(),
            embedding_model: "all-minilm".to_string(),
            embedding_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            embedding_endpoint: DEFAULT_ENDPOINT.to_string(),
            chunk_size: 1000,
            chunk_overlap: 150,
            top_k: 4,
            batch_size: DEFAULT_BATCH_SIZE,
            sample_scan_limit: 1000,
            metric: DistanceMetric::Cosine,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Build a config from process environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// | variable | field |
    /// |----------|-------|
    /// | `MEDSIM_INDEX_DIR` | `persist_dir` |
    /// | `MEDSIM_COLLECTION` | `collection` |
    /// | `EMBEDDING_MODEL` | `embedding_model` |
    /// | `EMBEDDING_DIMENSIONS` | `embedding_dimensions` |
    /// | `OLLAMA_ENDPOINT` | `embedding_endpoint` |
    /// | `CHUNK_SIZE` | `chunk_size` |
    /// | `CHUNK_OVERLAP` | `chunk_overlap` |
    /// | `TOP_K` | `top_k` |
    /// | `EMBED_BATCH_SIZE` | `batch_size` |
    /// | `SAMPLE_SCAN_LIMIT` | `sample_scan_limit` |
    /// | `DISTANCE_METRIC` | `metric` |
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] for unparsable values or an invalid
    /// combination (see [`RagConfigBuilder::build`]).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut builder = Self::builder();

        if let Some(dir) = get("MEDSIM_INDEX_DIR") {
            builder = builder.persist_dir(dir);
        }
        if let Some(name) = get("MEDSIM_COLLECTION") {
            builder = builder.collection(name);
        }
        if let Some(model) = get("EMBEDDING_MODEL") {
            builder = builder.embedding_model(model);
        }
        if let Some(v) = get("EMBEDDING_DIMENSIONS") {
            builder = builder.embedding_dimensions(parse_var("EMBEDDING_DIMENSIONS", &v)?);
        }
        if let Some(endpoint) = get("OLLAMA_ENDPOINT") {
            builder = builder.embedding_endpoint(endpoint);
        }
        if let Some(v) = get("CHUNK_SIZE") {
            builder = builder.chunk_size(parse_var("CHUNK_SIZE", &v)?);
        }
        if let Some(v) = get("CHUNK_OVERLAP") {
            builder = builder.chunk_overlap(parse_var("CHUNK_OVERLAP", &v)?);
        }
        if let Some(v) = get("TOP_K") {
            builder = builder.top_k(parse_var("TOP_K", &v)?);
        }
        if let Some(v) = get("EMBED_BATCH_SIZE") {
            builder = builder.batch_size(parse_var("EMBED_BATCH_SIZE", &v)?);
        }
        if let Some(v) = get("SAMPLE_SCAN_LIMIT") {
            builder = builder.sample_scan_limit(parse_var("SAMPLE_SCAN_LIMIT", &v)?);
        }
        if let Some(v) = get("DISTANCE_METRIC") {
            builder = builder.metric(v.parse()?);
        }

        builder.build()
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| RagError::Config(format!("invalid value '{value}' for {key}: {e}")))
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the vector store directory.
    pub fn persist_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.persist_dir = dir.into();
        self
    }

    /// Set the collection name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    /// Set the embedding model identifier.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the vector length of the embedding model.
    pub fn embedding_dimensions(mut self, dimensions: usize) -> Self {
        self.config.embedding_dimensions = dimensions;
        self
    }

    /// Set the embedding backend base URL.
    pub fn embedding_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.embedding_endpoint = endpoint.into();
        self
    }

    /// Set the chunk window size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the default number of results per query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the embedding/write batch size.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set how many metadata rows random case sampling may scan.
    pub fn sample_scan_limit(mut self, limit: usize) -> Self {
        self.config.sample_scan_limit = limit;
        self
    }

    /// Set the distance metric for new collections.
    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.config.metric = metric;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `batch_size == 0`
    /// - `embedding_dimensions == 0`
    /// - `collection` is empty
    pub fn build(self) -> Result<RagConfig> {
        let c = &self.config;
        if c.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if c.chunk_overlap >= c.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        if c.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if c.batch_size == 0 {
            return Err(RagError::Config("batch_size must be greater than zero".to_string()));
        }
        if c.embedding_dimensions == 0 {
            return Err(RagError::Config("embedding_dimensions must be greater than zero".to_string()));
        }
        if c.collection.trim().is_empty() {
            return Err(RagError::Config("collection name must not be empty".to_string()));
        }
        Ok(self.config)
    }
}
