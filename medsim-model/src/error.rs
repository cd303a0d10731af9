//! Error types for the `medsim-model` crate.

use medsim_rag::RagError;
use thiserror::Error;

/// Errors raised while generating text or running a tutoring session.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The generation backend failed or answered with an error.
    #[error("Generation error: {message}")]
    Generation {
        /// A description of the failure.
        message: String,
    },

    /// Invalid generation settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Retrieval failed underneath a session call.
    #[error(transparent)]
    Rag(#[from] RagError),
}

impl ModelError {
    pub(crate) fn generation(message: impl Into<String>) -> Self {
        Self::Generation { message: message.into() }
    }
}

/// A convenience result type for generation operations.
pub type Result<T> = std::result::Result<T, ModelError>;
