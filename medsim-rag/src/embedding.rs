//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap a concrete embedding backend (a local Ollama model,
/// a remote service, a test double) behind one async interface. The default
/// [`embed_batch`](EmbeddingProvider::embed_batch) calls
/// [`embed`](EmbeddingProvider::embed) sequentially; backends that support
/// native batching should override it.
///
/// Vectors do not need to be normalized; the indexer and retriever scale them
/// to unit length before they reach a store.
///
/// # Example
///
/// ```rust,ignore
/// use medsim_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("chest pain radiating to the left arm").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, one per input
    /// and in the same order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Short provider name used in logs and errors.
    fn name(&self) -> &str {
        "custom"
    }
}

/// Scale `vector` to unit L2 length in place. Zero vectors are left as is.
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}
