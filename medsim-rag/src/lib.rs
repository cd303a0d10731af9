//! # medsim-rag
//!
//! Retrieval over medical case reports: chunk, embed, store, search.
//!
//! ## Overview
//!
//! - [`FixedSizeChunker`] - overlapping character windows over a document
//! - [`Indexer`] - batches chunks through an [`EmbeddingProvider`] into a [`VectorStore`]
//! - [`Retriever`] - nearest-neighbour search with an optional per-case filter
//! - [`InMemoryVectorStore`] / [`LocalVectorStore`] - bundled store backends
//! - [`JsonlDocumentSource`] - streams case reports from a `.jsonl` dump
//! - `OllamaEmbeddingProvider` - local embeddings (feature `ollama`, on by default)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use medsim_rag::*;
//!
//! let config = RagConfig::from_env()?;
//! let embedder: Arc<dyn EmbeddingProvider> = Arc::new(OllamaEmbeddingProvider::from_config(&config)?);
//! let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::open(&config.persist_dir).await?);
//!
//! let indexer = Indexer::builder()
//!     .config(config.clone())
//!     .embedding_provider(embedder.clone())
//!     .vector_store(store.clone())
//!     .build()?;
//! indexer.index(JsonlDocumentSource::open("casereports.jsonl")?.limit(100)).await?;
//!
//! let retriever = Retriever::builder()
//!     .config(config)
//!     .embedding_provider(embedder)
//!     .vector_store(store)
//!     .build()?;
//! let hits = retriever.retrieve_default("pleuritic chest pain", None).await?;
//! ```
//!
//! Scores are raw distances under the collection's [`DistanceMetric`]: lower
//! is closer.

pub mod chunking;
mod collection;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod ids;
pub mod indexer;
pub mod inmemory;
pub mod local;
pub mod metric;
#[cfg(feature = "ollama")]
pub mod ollama;
pub mod retriever;
pub mod source;
pub mod vectorstore;

pub use chunking::{Chunker, FixedSizeChunker, split_text};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{
    Chunk, ChunkMetadata, Document, IndexedRecord, MetadataFilter, RetrievalResult, StoreMatch,
};
pub use embedding::{EmbeddingProvider, normalize};
pub use error::{RagError, Result};
pub use ids::{RecordIdStrategy, SaltedRecordIds, SequentialRecordIds};
pub use indexer::{IndexReport, Indexer, IndexerBuilder};
pub use inmemory::InMemoryVectorStore;
pub use local::LocalVectorStore;
pub use metric::DistanceMetric;
#[cfg(feature = "ollama")]
pub use ollama::OllamaEmbeddingProvider;
pub use retriever::{Retriever, RetrieverBuilder};
pub use source::JsonlDocumentSource;
pub use vectorstore::VectorStore;
