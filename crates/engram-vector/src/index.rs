//! Exact-scan vector index.
//!
//! The index stores vectors in a hash map and answers searches by scoring
//! every stored vector against the query. Scan cost is linear in the
//! collection size, which is the intended trade-off here: collections are
//! per-namespace and bounded, and the exact maximum similarity is required
//! by callers (approximate neighbors are not good enough for
//! consolidation decisions).

use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::types::{SearchResult, VectorId, VectorMetadata};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::trace;

/// A stored vector with its optional metadata.
#[derive(Debug, Clone)]
struct Entry {
    vector: Vec<f32>,
    metadata: Option<VectorMetadata>,
}

/// Thread-safe exact-scan index.
///
/// Reads take a shared lock and never block each other; writes take the
/// exclusive lock for the duration of the map mutation only.
pub struct FlatIndex {
    entries: RwLock<HashMap<VectorId, Entry>>,
    dimensions: usize,
    metric: DistanceMetric,
}

impl FlatIndex {
    /// Create a new index for vectors of the given dimensionality.
    pub fn new(dimensions: usize, metric: DistanceMetric) -> Result<Self> {
        if dimensions == 0 {
            return Err(Error::InvalidVector("dimensions must be > 0".to_string()));
        }

        Ok(Self {
            entries: RwLock::new(HashMap::new()),
            dimensions,
            metric,
        })
    }

    /// Get the vector dimensions.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Get the distance metric.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Get the number of vectors in the index.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Check if a vector exists.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    fn validate(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidVector(
                "vector contains NaN or Inf".to_string(),
            ));
        }
        Ok(())
    }

    /// Insert a vector, replacing any existing vector with the same ID.
    pub fn insert(&self, id: &str, vector: &[f32], metadata: Option<VectorMetadata>) -> Result<()> {
        self.validate(vector)?;

        self.entries.write().insert(
            id.to_string(),
            Entry {
                vector: vector.to_vec(),
                metadata,
            },
        );
        trace!(id, "inserted vector");
        Ok(())
    }

    /// Replace an existing vector.
    ///
    /// Unlike [`insert`](Self::insert), this fails if the ID is unknown.
    pub fn update(&self, id: &str, vector: &[f32], metadata: Option<VectorMetadata>) -> Result<()> {
        self.validate(vector)?;

        let mut entries = self.entries.write();
        match entries.get_mut(id) {
            Some(entry) => {
                entry.vector = vector.to_vec();
                entry.metadata = metadata;
                Ok(())
            }
            None => Err(Error::VectorNotFound(id.to_string())),
        }
    }

    /// Delete a vector. Returns whether it existed.
    pub fn delete(&self, id: &str) -> bool {
        self.entries.write().remove(id).is_some()
    }

    /// Get a vector and its metadata by ID.
    pub fn get(&self, id: &str) -> Option<(Vec<f32>, Option<VectorMetadata>)> {
        self.entries
            .read()
            .get(id)
            .map(|e| (e.vector.clone(), e.metadata.clone()))
    }

    /// Search for the vectors most similar to `query`.
    ///
    /// Results are ordered by score descending; equal scores are ordered by
    /// ID ascending so that repeated searches are deterministic.
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        self.search_with_threshold(query, limit, f32::NEG_INFINITY)
    }

    /// Search with a minimum score cutoff.
    pub fn search_with_threshold(
        &self,
        query: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        self.validate(query)?;

        let mut results: Vec<SearchResult> = {
            let entries = self.entries.read();
            entries
                .iter()
                .map(|(id, entry)| {
                    SearchResult::new(
                        id.clone(),
                        self.metric.similarity(query, &entry.vector),
                        entry.metadata.clone(),
                    )
                })
                .filter(|r| r.score >= min_score)
                .collect()
        };

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(limit);
        Ok(results)
    }

    /// Export all vectors for persistence.
    pub fn export_all(&self) -> Vec<(VectorId, Vec<f32>, Option<VectorMetadata>)> {
        self.entries
            .read()
            .iter()
            .map(|(id, e)| (id.clone(), e.vector.clone(), e.metadata.clone()))
            .collect()
    }

    /// Approximate memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        let entries = self.entries.read();
        entries
            .iter()
            .map(|(id, e)| id.len() + e.vector.len() * std::mem::size_of::<f32>())
            .sum()
    }
}
