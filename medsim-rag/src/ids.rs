//! Record id generation for indexed chunks.

/// Builds the id of an indexed chunk from its coordinates.
///
/// Implementations must be pure: equal inputs give equal ids, and distinct
/// `(source_id, row_index, chunk_index)` triples give distinct ids.
pub trait RecordIdStrategy: Send + Sync {
    /// Id for chunk `chunk_index` of the document ingested as row `row_index`.
    fn record_id(&self, source_id: &str, row_index: usize, chunk_index: usize) -> String;
}

/// `{source_id}-{row_index}-{chunk_index}`.
///
/// The two trailing integers are parsed from the right, so ids stay distinct
/// even when `source_id` itself contains `-`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialRecordIds;

impl RecordIdStrategy for SequentialRecordIds {
    fn record_id(&self, source_id: &str, row_index: usize, chunk_index: usize) -> String {
        format!("{source_id}-{row_index}-{chunk_index}")
    }
}

/// `{salt}:{source_id}-{row_index}-{chunk_index}`.
///
/// The indexer's default, with a fresh salt per ingestion run: indexing the
/// same rows again without a reset then writes new ids instead of colliding.
#[derive(Debug, Clone)]
pub struct SaltedRecordIds {
    salt: String,
}

impl SaltedRecordIds {
    /// Create a strategy prefixing every id with `salt`.
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }
}

impl RecordIdStrategy for SaltedRecordIds {
    fn record_id(&self, source_id: &str, row_index: usize, chunk_index: usize) -> String {
        format!("{}:{source_id}-{row_index}-{chunk_index}", self.salt)
    }
}

impl<F> RecordIdStrategy for F
where
    F: Fn(&str, usize, usize) -> String + Send + Sync,
{
    fn record_id(&self, source_id: &str, row_index: usize, chunk_index: usize) -> String {
        self(source_id, row_index, chunk_index)
    }
}
