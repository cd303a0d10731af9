//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use medsim_rag::{EmbeddingProvider, RagError, Result};

/// Deterministic hash-based embeddings: equal texts give equal vectors.
pub struct HashEmbedder {
    pub dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

pub fn hash_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
    (0..dimensions).map(|i| ((hash.wrapping_add(i as u64)) as f32).sin()).collect()
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(hash_embedding(text, self.dimensions))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Records every batch call and optionally fails on the `fail_on`-th call (1-based).
pub struct CountingEmbedder {
    pub dimensions: usize,
    pub fail_on: Option<usize>,
    pub calls: AtomicUsize,
    pub batch_sizes: Mutex<Vec<usize>>,
}

impl CountingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, fail_on: None, calls: AtomicUsize::new(0), batch_sizes: Mutex::new(Vec::new()) }
    }

    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on = Some(call);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(hash_embedding(text, self.dimensions))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.batch_sizes.lock().unwrap().push(texts.len());
        if self.fail_on == Some(call) {
            return Err(RagError::Embedding {
                provider: "counting".into(),
                message: format!("injected failure on call {call}"),
            });
        }
        Ok(texts.iter().map(|t| hash_embedding(t, self.dimensions)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Text of `len` characters cycling through the alphabet.
pub fn alphabet_text(len: usize) -> String {
    (0..len).map(|i| char::from(b'a' + (i % 26) as u8)).collect()
}
