//! Memory storage.
//!
//! The store exclusively owns all memory records. It performs
//! consolidation on write, similarity search on read, and explicit
//! deletion; the manager above it holds no persistent state. Backends are
//! abstracted behind the [`MemoryStore`] trait.

mod vector;

pub use vector::VectorMemoryStore;

use crate::config::ConsolidationConfig;
use crate::types::{MemoryRecord, Result, ScoredMemory, SourceTurn, UpsertOutcome};
use async_trait::async_trait;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

/// Abstract interface for memory storage backends.
///
/// Writes for the same user are serialized internally (single writer per
/// namespace); reads may run concurrently and see a consistent snapshot.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Consolidate one candidate statement into the user's memory set.
    ///
    /// If the best same-model match scores at or above the consolidation
    /// threshold the candidate is merged into that record; otherwise a new
    /// record is created (evicting per policy when at capacity).
    async fn upsert(
        &self,
        user_id: &str,
        candidate: &str,
        embedding: Vec<f32>,
        embedder_model: &str,
        source: SourceTurn,
    ) -> Result<UpsertOutcome>;

    /// Rank the user's records by similarity to the query embedding,
    /// descending; ties broken by `updated_at` descending. Read-only.
    ///
    /// Records embedded under a different model are excluded. An unknown
    /// user yields an empty result, not an error.
    async fn search(
        &self,
        user_id: &str,
        query_embedding: &[f32],
        embedder_model: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredMemory>>;

    /// Remove a record. Returns whether a record was removed.
    async fn delete(&self, user_id: &str, record_id: &str) -> Result<bool>;

    /// Number of records in the user's memory set.
    async fn count(&self, user_id: &str) -> Result<usize>;

    /// Records embedded under a model other than `embedder_model`.
    async fn stale_records(
        &self,
        user_id: &str,
        embedder_model: &str,
    ) -> Result<Vec<MemoryRecord>>;

    /// Swap a record's embedding for one produced by the given model,
    /// leaving text, provenance, and recency untouched. Returns whether
    /// the record existed.
    async fn replace_embedding(
        &self,
        user_id: &str,
        record_id: &str,
        embedding: Vec<f32>,
        embedder_model: &str,
    ) -> Result<bool>;

    /// Flush a full snapshot to durable storage (no-op for ephemeral
    /// backends).
    async fn persist(&self) -> Result<()>;
}

/// Store backend selection.
#[derive(Debug, Clone, Default)]
pub enum StoreProvider {
    /// Ephemeral in-memory store (development and tests).
    #[default]
    InMemory,
    /// Embedded store persisted to a local directory.
    Embedded {
        /// Directory for `records.json` and vector snapshots.
        path: PathBuf,
    },
}

impl StoreProvider {
    /// Create a store from this provider configuration.
    pub async fn create_store(&self, config: ConsolidationConfig) -> Result<Arc<dyn MemoryStore>> {
        match self {
            StoreProvider::InMemory => {
                Ok(Arc::new(VectorMemoryStore::in_memory(config).await?))
            }
            StoreProvider::Embedded { path } => {
                Ok(Arc::new(VectorMemoryStore::open(config, path.clone()).await?))
            }
        }
    }

    /// Select a provider from environment variables.
    ///
    /// A non-empty `MEMORY_DATA_PATH` selects the embedded store; the
    /// default is in-memory.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        match env::var("MEMORY_DATA_PATH") {
            Ok(path) if !path.is_empty() => StoreProvider::Embedded { path: path.into() },
            _ => StoreProvider::InMemory,
        }
    }
}
