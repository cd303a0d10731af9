//! Error types for the `medsim-rag` crate.

use thiserror::Error;

/// Errors that can occur while chunking, indexing or retrieving.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid configuration, rejected before any work is done.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The embedding collaborator failed or returned unusable output.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector store collaborator failed.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// Filesystem failure outside of a store operation.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RagError {
    pub(crate) fn store(backend: &str, message: impl Into<String>) -> Self {
        Self::VectorStore { backend: backend.to_string(), message: message.into() }
    }

    pub(crate) fn embedding(provider: &str, message: impl Into<String>) -> Self {
        Self::Embedding { provider: provider.to_string(), message: message.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
