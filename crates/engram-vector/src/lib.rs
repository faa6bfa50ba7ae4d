//! # engram-vector
//!
//! A pure-Rust embedded vector store with per-namespace collections and
//! exact similarity search.
//!
//! ## Features
//!
//! - **Pure Rust**: no native dependencies, compiles anywhere Rust does
//! - **Exact search**: every query scans the collection and returns the true
//!   ranking, deterministically ordered
//! - **Thread-safe**: lock-free collection registry, concurrent reads
//! - **Persistence**: optional JSON snapshots per collection
//! - **Multiple distance metrics**: Cosine, Euclidean (L2), Dot Product,
//!   Manhattan (L1)
//!
//! Collections here are deliberately small and many: the intended usage is
//! one collection per namespace (for example, one per user), each bounded by
//! the caller, where exact scoring matters more than sub-linear search.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use engram_vector::{Config, DistanceMetric, VectorDb};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), engram_vector::Error> {
//!     let db = VectorDb::open(Config::memory()).await?;
//!
//!     db.get_or_create_collection("user:alice", 384, DistanceMetric::Cosine)
//!         .await?;
//!     db.insert("user:alice", "rec1", &vec![0.1f32; 384], None).await?;
//!
//!     let results = db.search("user:alice", &vec![0.1f32; 384], 10).await?;
//!     assert_eq!(results[0].id, "rec1");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collection;
pub mod config;
pub mod distance;
pub mod error;
pub mod index;
pub mod persistence;
pub mod types;

pub use collection::Collection;
pub use config::Config;
pub use distance::DistanceMetric;
pub use error::{Error, Result};
pub use types::{MetadataValue, SearchResult, VectorId, VectorMetadata};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// The main vector database instance.
///
/// `VectorDb` manages multiple collections, each holding vectors of one
/// dimensionality. It is cheap to clone and safe to share across tasks:
/// the collection registry is an async-safe `scc::HashMap`, and each
/// collection guards its own storage.
#[derive(Clone)]
pub struct VectorDb {
    inner: Arc<VectorDbInner>,
}

struct VectorDbInner {
    config: Config,
    collections: scc::HashMap<String, Arc<Collection>>,
}

impl VectorDb {
    /// Open or create a vector database with the given configuration.
    ///
    /// For a persistent configuration, existing collection snapshots under
    /// the data path are loaded eagerly.
    #[instrument(skip(config), fields(persistent = config.data_path.is_some()))]
    pub async fn open(config: Config) -> Result<Self> {
        info!("opening vector database");

        let db = Self {
            inner: Arc::new(VectorDbInner {
                config: config.clone(),
                collections: scc::HashMap::new(),
            }),
        };

        if let Some(ref path) = config.data_path {
            db.load_collections(path).await?;
        }

        Ok(db)
    }

    /// Create a new collection with the given parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CollectionExists`] if the name is taken.
    #[instrument(skip(self))]
    pub async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        let collection = Arc::new(Collection::new(
            name.to_string(),
            dimensions,
            metric,
            self.inner.config.max_vectors,
        )?);

        // Insert fails if the key exists, which also covers the race of two
        // concurrent creators.
        if self
            .inner
            .collections
            .insert(name.to_string(), collection)
            .is_err()
        {
            return Err(Error::CollectionExists(name.to_string()));
        }

        info!(name, dimensions, ?metric, "created collection");
        if let Some(ref path) = self.inner.config.data_path {
            self.write_manifest(path).await?;
        }
        Ok(())
    }

    /// Get a collection, creating it if it does not exist yet.
    ///
    /// When the collection already exists its dimensions must match
    /// `dimensions`; the metric of an existing collection is left as-is.
    pub async fn get_or_create_collection(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<Arc<Collection>> {
        loop {
            if let Some(existing) = self.inner.collections.read(name, |_, v| v.clone()) {
                if existing.dimensions() != dimensions {
                    return Err(Error::DimensionMismatch {
                        expected: existing.dimensions(),
                        actual: dimensions,
                    });
                }
                return Ok(existing);
            }

            let collection = Arc::new(Collection::new(
                name.to_string(),
                dimensions,
                metric,
                self.inner.config.max_vectors,
            )?);

            if self
                .inner
                .collections
                .insert(name.to_string(), collection.clone())
                .is_ok()
            {
                debug!(name, dimensions, "created collection lazily");
                if let Some(ref path) = self.inner.config.data_path {
                    self.write_manifest(path).await?;
                }
                return Ok(collection);
            }
            // Lost the creation race; loop re-reads the winner.
        }
    }

    /// Delete a collection and all its data.
    #[instrument(skip(self))]
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        if self.inner.collections.remove(name).is_none() {
            return Err(Error::CollectionNotFound(name.to_string()));
        }

        if let Some(ref path) = self.inner.config.data_path {
            persistence::remove_collection(path, name).await?;
            self.write_manifest(path).await?;
        }
        Ok(())
    }

    /// Check if a collection exists.
    pub fn collection_exists(&self, name: &str) -> bool {
        self.inner.collections.contains(name)
    }

    /// List all collection names.
    pub fn list_collections(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.inner.collections.scan(|k, _| {
            names.push(k.clone());
        });
        names
    }

    /// Get a reference to a collection.
    pub fn get_collection(&self, name: &str) -> Result<Arc<Collection>> {
        self.inner
            .collections
            .read(name, |_, v| v.clone())
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
    }

    /// Insert a vector into a collection, replacing any existing vector
    /// with the same ID.
    #[instrument(skip(self, vector, metadata), fields(collection, id, dim = vector.len()))]
    pub async fn insert(
        &self,
        collection: &str,
        id: &str,
        vector: &[f32],
        metadata: Option<VectorMetadata>,
    ) -> Result<()> {
        self.get_collection(collection)?.insert(id, vector, metadata)
    }

    /// Replace an existing vector in a collection.
    #[instrument(skip(self, vector, metadata), fields(collection, id))]
    pub async fn update(
        &self,
        collection: &str,
        id: &str,
        vector: &[f32],
        metadata: Option<VectorMetadata>,
    ) -> Result<()> {
        self.get_collection(collection)?.update(id, vector, metadata)
    }

    /// Delete a vector from a collection.
    ///
    /// Returns `true` if the vector existed.
    #[instrument(skip(self), fields(collection, id))]
    pub async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        Ok(self.get_collection(collection)?.delete(id))
    }

    /// Search for similar vectors, best first.
    #[instrument(skip(self, query), fields(collection, limit, dim = query.len()))]
    pub async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let results = self.get_collection(collection)?.search(query, limit)?;
        debug!(count = results.len(), "search completed");
        Ok(results)
    }

    /// Search with a minimum score cutoff.
    #[instrument(skip(self, query), fields(collection, limit, min_score))]
    pub async fn search_with_threshold(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        self.get_collection(collection)?
            .search_with_threshold(query, limit, min_score)
    }

    /// Get a vector by ID.
    pub async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<(Vec<f32>, Option<VectorMetadata>)>> {
        Ok(self.get_collection(collection)?.get(id))
    }

    /// Check if a vector exists.
    pub fn contains(&self, collection: &str, id: &str) -> Result<bool> {
        Ok(self.get_collection(collection)?.contains(id))
    }

    /// Get the number of vectors in a collection.
    pub fn count(&self, collection: &str) -> Result<usize> {
        Ok(self.get_collection(collection)?.len())
    }

    /// Get collection statistics.
    pub fn collection_stats(&self, collection: &str) -> Result<CollectionStats> {
        Ok(self.get_collection(collection)?.stats())
    }

    /// Persist every collection to disk.
    ///
    /// A no-op for in-memory databases.
    #[instrument(skip(self))]
    pub async fn persist(&self) -> Result<()> {
        let Some(ref path) = self.inner.config.data_path else {
            debug!("skipping persist for in-memory database");
            return Ok(());
        };

        tokio::fs::create_dir_all(path).await?;

        let mut to_persist: Vec<Arc<Collection>> = Vec::new();
        self.inner.collections.scan(|_, collection| {
            to_persist.push(collection.clone());
        });

        for collection in &to_persist {
            persistence::save_collection(path, collection).await?;
        }
        self.write_manifest(path).await?;

        info!(collections = to_persist.len(), "persisted database");
        Ok(())
    }

    async fn load_collections(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            tokio::fs::create_dir_all(path).await?;
            return Ok(());
        }

        let manifest_path = path.join("collections.json");
        if !manifest_path.exists() {
            return Ok(());
        }

        let data = tokio::fs::read_to_string(&manifest_path).await?;
        let manifest: Manifest = serde_json::from_str(&data)
            .map_err(|e| Error::Persistence(format!("failed to parse collections.json: {}", e)))?;

        for name in manifest.collections {
            match persistence::load_collection(path, &name, self.inner.config.max_vectors).await {
                Ok(collection) => {
                    let _ = self
                        .inner
                        .collections
                        .insert(name.clone(), Arc::new(collection));
                }
                Err(e) => {
                    warn!(name, error = %e, "failed to load collection, skipping");
                }
            }
        }

        Ok(())
    }

    async fn write_manifest(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path).await?;
        let manifest = Manifest {
            collections: self.list_collections(),
        };
        let data = serde_json::to_string_pretty(&manifest)
            .map_err(|e| Error::Persistence(format!("failed to serialize manifest: {}", e)))?;
        tokio::fs::write(path.join("collections.json"), data).await?;
        Ok(())
    }
}

/// On-disk list of collections.
#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    collections: Vec<String>,
}

/// Statistics about a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Name of the collection.
    pub name: String,
    /// Number of vectors in the collection.
    pub vector_count: usize,
    /// Dimensionality of vectors.
    pub dimensions: usize,
    /// Distance metric used.
    pub metric: DistanceMetric,
    /// Approximate memory usage in bytes.
    pub memory_bytes: usize,
}
