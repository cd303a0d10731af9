//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`FixedSizeChunker`], which
//! splits text into fixed-size character windows with a configurable overlap.

use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// A strategy for splitting documents into chunks.
///
/// Implementations must be pure: the same document always yields the same
/// chunks, numbered from `0` in text order.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits text into windows of `chunk_size` characters, each starting
/// `chunk_size - chunk_overlap` characters after the previous one.
///
/// Sizes are counted in `char`s, so multi-byte text is never cut inside a
/// code point. The last window may be shorter than `chunk_size`.
///
/// # Example
///
/// ```rust
/// use medsim_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(4, 1).unwrap();
/// assert_eq!(chunker.split("abcdefghij"), vec!["abcd", "defg", "ghij"]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] unless `chunk_size > chunk_overlap`.
    /// An overlap as large as the window would never advance the cursor.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Window length in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters shared by consecutive windows.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split raw text into ordered, overlapping windows.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, including the end of the text.
        let bounds: Vec<usize> =
            text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        let len = bounds.len() - 1;
        let step = self.chunk_size - self.chunk_overlap;

        let mut chunks = Vec::with_capacity(len / step + 1);
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(len);
            chunks.push(text[bounds[start]..bounds[end]].to_string());
            if end == len {
                break;
            }
            start += step;
        }
        chunks
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        self.split(&document.text)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| Chunk {
                source_id: document.id.clone(),
                chunk_index,
                text,
            })
            .collect()
    }
}

/// Split `text` with a one-off [`FixedSizeChunker`].
///
/// # Errors
///
/// Returns [`RagError::Config`] for an invalid size/overlap pair.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    Ok(FixedSizeChunker::new(chunk_size, chunk_overlap)?.split(text))
}
