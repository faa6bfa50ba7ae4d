//! Configuration for engram-vector.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the vector database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to store snapshots on disk. If None, data is kept in memory only.
    pub data_path: Option<PathBuf>,

    /// Maximum number of vectors per collection (0 = unlimited).
    ///
    /// This is a hard cap: inserts beyond it fail with
    /// [`Error::CollectionFull`](crate::Error::CollectionFull). Callers that
    /// want eviction instead of failure enforce their own bound below this
    /// one.
    pub max_vectors: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: None,
            max_vectors: 0,
        }
    }
}

impl Config {
    /// Create an in-memory configuration.
    ///
    /// Data is not persisted and is lost when the process exits.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Create a persistent configuration.
    ///
    /// Snapshots are stored at the given path and loaded on open.
    pub fn persistent<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            data_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Set the maximum number of vectors per collection.
    pub fn with_max_vectors(mut self, max: usize) -> Self {
        self.max_vectors = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_config() {
        let config = Config::memory();
        assert!(config.data_path.is_none());
        assert_eq!(config.max_vectors, 0);
    }

    #[test]
    fn test_persistent_config() {
        let config = Config::persistent("/tmp/engram").with_max_vectors(100);
        assert!(config.data_path.is_some());
        assert_eq!(config.max_vectors, 100);
    }
}
