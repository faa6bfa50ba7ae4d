//! Configuration for the memory core.
//!
//! Configuration is an immutable value handed to constructors. The core
//! never reads ambient process state on its own; `from_env` and
//! `from_toml_str` are conveniences for composition roots.

use crate::types::{MemoryError, Result};
use engram_vector::DistanceMetric;
use serde::Deserialize;
use std::env;

/// Top-level configuration for [`MemoryManager`](crate::MemoryManager) and
/// the memory store.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Consolidation and eviction tuning.
    pub consolidation: ConsolidationConfig,
    /// Ingestion behavior.
    pub ingest: IngestConfig,
}

/// Tuning for the consolidation step of `upsert`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// Similarity at or above which a candidate merges into an existing
    /// record instead of creating a new one.
    ///
    /// Both false merges (threshold too low) and failures to merge
    /// (too high) are observable failure modes; the right value depends on
    /// the embedder and needs calibration, which is why this is plain
    /// config rather than a constant.
    pub threshold: f32,

    /// Distance metric for similarity comparisons.
    pub metric: DistanceMetric,

    /// Bound on a user's memory set.
    pub eviction: EvictionPolicy,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            threshold: 0.90,
            metric: DistanceMetric::Cosine,
            eviction: EvictionPolicy::default(),
        }
    }
}

/// Ingestion behavior during `update`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Extra embedding attempts per candidate before it is reported as
    /// failed. 0 means a single attempt and no retry.
    pub embed_retries: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { embed_retries: 0 }
    }
}

/// Bound on a user's memory set.
///
/// When an insert would exceed the bound, the least-recently-updated
/// record is evicted first. Reads never evict.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// No bound; callers manage forgetting via `delete`.
    Unbounded,
    /// At most this many records per user.
    MaxCount(usize),
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        EvictionPolicy::MaxCount(1024)
    }
}

impl EvictionPolicy {
    /// The record cap, if any.
    pub fn max_records(&self) -> Option<usize> {
        match self {
            EvictionPolicy::Unbounded => None,
            EvictionPolicy::MaxCount(n) => Some(*n),
        }
    }
}

impl MemoryConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// Recognized variables: `MEMORY_CONSOLIDATION_THRESHOLD`,
    /// `MEMORY_DISTANCE_METRIC`, `MEMORY_MAX_RECORDS_PER_USER`
    /// (0 = unbounded), `MEMORY_EMBED_RETRIES`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(raw) = env::var("MEMORY_CONSOLIDATION_THRESHOLD") {
            config.consolidation.threshold = raw.parse().map_err(|_| {
                MemoryError::Configuration(format!("invalid consolidation threshold: {}", raw))
            })?;
        }
        if let Ok(raw) = env::var("MEMORY_DISTANCE_METRIC") {
            config.consolidation.metric = raw.parse().map_err(MemoryError::Configuration)?;
        }
        if let Ok(raw) = env::var("MEMORY_MAX_RECORDS_PER_USER") {
            let count: usize = raw.parse().map_err(|_| {
                MemoryError::Configuration(format!("invalid max records per user: {}", raw))
            })?;
            config.consolidation.eviction = if count == 0 {
                EvictionPolicy::Unbounded
            } else {
                EvictionPolicy::MaxCount(count)
            };
        }
        if let Ok(raw) = env::var("MEMORY_EMBED_RETRIES") {
            config.ingest.embed_retries = raw.parse().map_err(|_| {
                MemoryError::Configuration(format!("invalid embed retries: {}", raw))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| MemoryError::Configuration(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let t = self.consolidation.threshold;
        if !t.is_finite() || t <= 0.0 {
            return Err(MemoryError::Configuration(format!(
                "consolidation threshold must be a positive finite number, got {}",
                t
            )));
        }
        if let Some(0) = self.consolidation.eviction.max_records() {
            return Err(MemoryError::Configuration(
                "max_count eviction requires a capacity of at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
