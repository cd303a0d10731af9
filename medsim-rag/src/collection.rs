//! Collection state shared by the bundled vector stores.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::document::{ChunkMetadata, IndexedRecord, MetadataFilter, StoreMatch};
use crate::error::{RagError, Result};
use crate::metric::DistanceMetric;

pub(crate) const MANIFEST_VERSION: u32 = 1;

/// Persisted description of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CollectionManifest {
    pub name: String,
    pub dimensions: usize,
    pub metric: DistanceMetric,
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    MANIFEST_VERSION
}

/// Records of one collection in insertion order, plus an id set for
/// collision checks.
#[derive(Debug)]
pub(crate) struct Collection {
    pub manifest: CollectionManifest,
    records: Vec<IndexedRecord>,
    ids: HashSet<String>,
}

impl Collection {
    pub fn new(manifest: CollectionManifest) -> Self {
        Self { manifest, records: Vec::new(), ids: HashSet::new() }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check a batch against this collection without modifying it.
    pub fn validate(&self, backend: &str, batch: &[IndexedRecord]) -> Result<()> {
        let mut seen = HashSet::with_capacity(batch.len());
        for record in batch {
            if record.embedding.len() != self.manifest.dimensions {
                return Err(RagError::store(
                    backend,
                    format!(
                        "record '{}' has {} dimensions, collection '{}' expects {}",
                        record.id,
                        record.embedding.len(),
                        self.manifest.name,
                        self.manifest.dimensions
                    ),
                ));
            }
            if self.ids.contains(&record.id) || !seen.insert(record.id.as_str()) {
                return Err(RagError::store(
                    backend,
                    format!(
                        "record id '{}' already exists in collection '{}'",
                        record.id, self.manifest.name
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Append records that already passed [`validate`](Self::validate).
    pub fn extend(&mut self, batch: Vec<IndexedRecord>) {
        for record in batch {
            self.ids.insert(record.id.clone());
            self.records.push(record);
        }
    }

    pub fn query(
        &self,
        backend: &str,
        embedding: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<StoreMatch>> {
        if embedding.len() != self.manifest.dimensions {
            return Err(RagError::store(
                backend,
                format!(
                    "query has {} dimensions, collection '{}' expects {}",
                    embedding.len(),
                    self.manifest.name,
                    self.manifest.dimensions
                ),
            ));
        }

        let metric = self.manifest.metric;
        let mut scored: Vec<(f32, &IndexedRecord)> = self
            .records
            .iter()
            .filter(|r| filter.matches(&r.metadata))
            .map(|r| (metric.distance(embedding, &r.embedding), r))
            .collect();

        // Stable sort keeps insertion order among equal distances.
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(distance, record)| StoreMatch { record: record.clone(), distance })
            .collect())
    }

    pub fn metadata(&self, filter: &MetadataFilter, limit: usize) -> Vec<ChunkMetadata> {
        self.records
            .iter()
            .filter(|r| filter.matches(&r.metadata))
            .take(limit)
            .map(|r| r.metadata.clone())
            .collect()
    }
}
