//! Streaming reader for case reports stored as JSON lines.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::document::Document;
use crate::error::Result;

/// One input row. Accepts both the plain `{id, text}` layout and the PMC
/// case-report dump layout `{PMC_id, context}`.
#[derive(Deserialize)]
struct Row {
    #[serde(alias = "PMC_id")]
    id: Option<serde_json::Value>,
    #[serde(alias = "context")]
    text: Option<String>,
}

/// Lazily yields [`Document`]s from a `.jsonl` file.
///
/// Rows without a usable id or text are skipped, as are lines that are not
/// valid JSON. Numeric ids are converted to strings.
///
/// ```rust,ignore
/// let docs = JsonlDocumentSource::open("data/casereports.jsonl")?.limit(500);
/// indexer.index(docs).await?;
/// ```
pub struct JsonlDocumentSource {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
    remaining: Option<usize>,
}

impl JsonlDocumentSource {
    /// Open `path` for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self { path, lines: BufReader::new(file).lines(), line_no: 0, remaining: None })
    }

    /// Stop after `n` documents have been yielded.
    pub fn limit(mut self, n: usize) -> Self {
        self.remaining = Some(n);
        self
    }

    fn parse(&self, line: &str) -> Option<Document> {
        let row: Row = match serde_json::from_str(line) {
            Ok(row) => row,
            Err(e) => {
                warn!(path = %self.path.display(), line = self.line_no, error = %e, "skipping malformed row");
                return None;
            }
        };

        let id = match row.id {
            Some(serde_json::Value::String(s)) => s.trim().to_string(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let text = row.text.unwrap_or_default();
        if id.is_empty() || text.trim().is_empty() {
            debug!(path = %self.path.display(), line = self.line_no, "skipping row without id or text");
            return None;
        }
        Some(Document { id, text })
    }
}

impl Iterator for JsonlDocumentSource {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        if self.remaining == Some(0) {
            return None;
        }
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "stopped reading documents");
                    return None;
                }
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            if let Some(doc) = self.parse(&line) {
                if let Some(n) = self.remaining.as_mut() {
                    *n -= 1;
                }
                return Some(doc);
            }
        }
    }
}
