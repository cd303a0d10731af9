//! Ollama embedding provider using the local `/api/embed` endpoint.
//!
//! This module is only available when the `ollama` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::{DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_ENDPOINT, RagConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const PROVIDER: &str = "Ollama";

/// The default embedding model (all-MiniLM-L6-v2).
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";

/// Dimensionality of [`DEFAULT_EMBEDDING_MODEL`].
pub const DEFAULT_DIMENSIONS: usize = DEFAULT_EMBEDDING_DIMENSIONS;

/// Request timeout for embedding calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// An [`EmbeddingProvider`] backed by a local Ollama server.
///
/// # Configuration
///
/// - `endpoint` – defaults to `http://localhost:11434`.
/// - `model` – defaults to `all-minilm`.
/// - `dimensions` – defaults to 384; override it for other models.
///
/// # Example
///
/// ```rust,ignore
/// use medsim_rag::OllamaEmbeddingProvider;
///
/// let provider = OllamaEmbeddingProvider::new("http://localhost:11434", "all-minilm")?;
/// let embedding = provider.embed("syncope after exertion").await?;
/// ```
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbeddingProvider {
    /// Create a provider for `model` served at `endpoint`.
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(RagError::Config("embedding model must not be empty".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| RagError::embedding(PROVIDER, format!("failed to build client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model,
            dimensions: DEFAULT_DIMENSIONS,
        })
    }

    /// Create a provider from the embedding fields of a [`RagConfig`],
    /// including its `embedding_dimensions`.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Ok(Self::new(&config.embedding_endpoint, &config.embedding_model)?
            .with_dimensions(config.embedding_dimensions))
    }

    /// Set the dimensionality reported by [`dimensions()`](EmbeddingProvider::dimensions).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self
    }

    /// The model name sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Default for OllamaEmbeddingProvider {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RagError::embedding(PROVIDER, "server returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let url = format!("{}/api/embed", self.endpoint);
        let body = EmbedRequest { model: &self.model, input: texts.to_vec() };
        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            error!(provider = PROVIDER, %url, error = %e, "request failed");
            RagError::embedding(PROVIDER, format!("request to {url} failed: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail =
                serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);
            error!(provider = PROVIDER, %status, "API error");
            return Err(RagError::embedding(PROVIDER, format!("server returned {status}: {detail}")));
        }

        let decoded: EmbedResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::embedding(PROVIDER, format!("failed to parse response: {e}"))
        })?;
        Ok(decoded.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let p = OllamaEmbeddingProvider::new("http://host:11434/", "all-minilm").unwrap();
        assert_eq!(p.endpoint, "http://host:11434");
        assert_eq!(p.dimensions(), DEFAULT_DIMENSIONS);
    }

    #[test]
    fn config_sets_model_and_dimensions() {
        let config = RagConfig::builder()
            .embedding_model("nomic-embed-text")
            .embedding_dimensions(768)
            .build()
            .unwrap();
        let p = OllamaEmbeddingProvider::from_config(&config).unwrap();
        assert_eq!(p.model(), "nomic-embed-text");
        assert_eq!(p.dimensions(), 768);
    }

    #[test]
    fn empty_model_is_rejected() {
        assert!(matches!(OllamaEmbeddingProvider::new(DEFAULT_ENDPOINT, " "), Err(RagError::Config(_))));
    }

    #[test]
    fn request_shape_matches_embed_api() {
        let body = EmbedRequest { model: "all-minilm", input: vec!["a", "b"] };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"model": "all-minilm", "input": ["a", "b"]}));

        let decoded: EmbedResponse =
            serde_json::from_str(r#"{"model":"all-minilm","embeddings":[[0.1,0.2]]}"#).unwrap();
        assert_eq!(decoded.embeddings, vec![vec![0.1, 0.2]]);
    }

    #[tokio::test]
    async fn empty_batch_makes_no_request() {
        let p = OllamaEmbeddingProvider::new("http://127.0.0.1:9", "all-minilm").unwrap();
        assert!(p.embed_batch(&[]).await.unwrap().is_empty());
    }
}
