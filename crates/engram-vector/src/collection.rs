//! Vector collection.
//!
//! A collection is a named container for vectors with a fixed
//! dimensionality, a distance metric, and an optional capacity cap.

use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::index::FlatIndex;
use crate::types::{SearchResult, VectorId, VectorMetadata};
use crate::CollectionStats;

/// A named collection of vectors.
pub struct Collection {
    name: String,
    /// Maximum number of vectors (0 = unlimited).
    max_vectors: usize,
    index: FlatIndex,
}

impl Collection {
    /// Create a new collection.
    pub fn new(
        name: String,
        dimensions: usize,
        metric: DistanceMetric,
        max_vectors: usize,
    ) -> Result<Self> {
        Ok(Self {
            name,
            max_vectors,
            index: FlatIndex::new(dimensions, metric)?,
        })
    }

    /// Get the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the vector dimensions.
    pub fn dimensions(&self) -> usize {
        self.index.dimensions()
    }

    /// Get the distance metric.
    pub fn metric(&self) -> DistanceMetric {
        self.index.metric()
    }

    /// Get the number of vectors in the collection.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Insert a vector, replacing any existing vector with the same ID.
    pub fn insert(&self, id: &str, vector: &[f32], metadata: Option<VectorMetadata>) -> Result<()> {
        if self.max_vectors > 0 && self.index.len() >= self.max_vectors && !self.index.contains(id)
        {
            return Err(Error::CollectionFull {
                name: self.name.clone(),
                capacity: self.max_vectors,
            });
        }
        self.index.insert(id, vector, metadata)
    }

    /// Replace an existing vector; fails if the ID is unknown.
    pub fn update(&self, id: &str, vector: &[f32], metadata: Option<VectorMetadata>) -> Result<()> {
        self.index.update(id, vector, metadata)
    }

    /// Delete a vector. Returns whether it existed.
    pub fn delete(&self, id: &str) -> bool {
        self.index.delete(id)
    }

    /// Search for similar vectors.
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        self.index.search(query, limit)
    }

    /// Search with a minimum score cutoff.
    pub fn search_with_threshold(
        &self,
        query: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        self.index.search_with_threshold(query, limit, min_score)
    }

    /// Get a vector by ID.
    pub fn get(&self, id: &str) -> Option<(Vec<f32>, Option<VectorMetadata>)> {
        self.index.get(id)
    }

    /// Check if a vector exists.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Get collection statistics.
    pub fn stats(&self) -> CollectionStats {
        CollectionStats {
            name: self.name.clone(),
            vector_count: self.index.len(),
            dimensions: self.index.dimensions(),
            metric: self.index.metric(),
            memory_bytes: self.index.memory_usage(),
        }
    }

    /// Export all vectors for persistence.
    pub fn export_all(&self) -> Vec<(VectorId, Vec<f32>, Option<VectorMetadata>)> {
        self.index.export_all()
    }
}
