//! Data types for documents, chunks, indexed records and retrieval results.

use serde::{Deserialize, Serialize};

/// A source case report: an identifier and its full text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Unique identifier for the document (for example a PMC id).
    pub id: String,
    /// The text content of the document.
    pub text: String,
}

impl Document {
    /// Create a document from an id and text body.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into() }
    }
}

/// A contiguous window of a [`Document`]'s text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// The ID of the parent [`Document`].
    pub source_id: String,
    /// 0-based position among the chunks of the same document.
    pub chunk_index: usize,
    /// The text content of the chunk.
    pub text: String,
}

/// Metadata stored alongside every indexed chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChunkMetadata {
    /// The ID of the parent document.
    pub source_id: String,
    /// 0-based position of the chunk within its document.
    pub chunk_index: usize,
    /// Ingestion row the chunk came from; only used for id uniqueness.
    pub row_index: usize,
}

/// A chunk with its embedding, as owned by a vector store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedRecord {
    /// Globally unique record id.
    pub id: String,
    /// The chunk text.
    pub text: String,
    /// Unit-length embedding of `text`.
    pub embedding: Vec<f32>,
    /// Source and position metadata.
    pub metadata: ChunkMetadata,
}

/// Exact-match predicate over [`ChunkMetadata`]. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    /// Required source document id.
    pub source_id: Option<String>,
    /// Required chunk index.
    pub chunk_index: Option<usize>,
}

impl MetadataFilter {
    /// A filter that matches every record.
    pub fn any() -> Self {
        Self::default()
    }

    /// Only records belonging to `source_id`.
    pub fn source(source_id: impl Into<String>) -> Self {
        Self { source_id: Some(source_id.into()), chunk_index: None }
    }

    /// Only the first chunk of every document.
    pub fn first_chunks() -> Self {
        Self { source_id: None, chunk_index: Some(0) }
    }

    /// Whether `metadata` satisfies every set field.
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        self.source_id.as_deref().is_none_or(|id| id == metadata.source_id)
            && self.chunk_index.is_none_or(|idx| idx == metadata.chunk_index)
    }
}

/// A record returned by a vector store query with its raw distance.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreMatch {
    /// The matched record.
    pub record: IndexedRecord,
    /// Distance to the query under the collection's metric (lower is closer).
    pub distance: f32,
}

/// A retrieved chunk, projected for consumers of the retriever.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    /// The chunk text.
    pub text: String,
    /// The document the chunk came from.
    pub source_id: String,
    /// Position of the chunk within its document.
    pub chunk_index: usize,
    /// Raw distance from the collection's [`DistanceMetric`](crate::DistanceMetric).
    ///
    /// Lower means more similar. The value is not bounded to `[0, 1]`.
    pub score: f32,
}

impl From<StoreMatch> for RetrievalResult {
    fn from(m: StoreMatch) -> Self {
        Self {
            text: m.record.text,
            source_id: m.record.metadata.source_id,
            chunk_index: m.record.metadata.chunk_index,
            score: m.distance,
        }
    }
}
