//! Snapshot persistence for engram-vector.
//!
//! Each collection is stored under its own directory:
//! `{base}/{dir}/metadata.json` plus `{base}/{dir}/vectors.json`. Collection
//! names may contain characters that are not filesystem-safe (namespaces
//! like `user:alice`), so directory names are an escaped form of the
//! collection name.

use crate::collection::Collection;
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::types::VectorMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Collection metadata stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CollectionMetadata {
    name: String,
    dimensions: usize,
    metric: String,
    saved_at: DateTime<Utc>,
}

/// One stored vector in `vectors.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredVector {
    id: String,
    vector: Vec<f32>,
    metadata: Option<VectorMetadata>,
}

/// Escape a collection name into a filesystem-safe directory name.
///
/// Alphanumerics, `.`, `_` and `-` pass through; every other byte becomes
/// `%XX`. The mapping is injective, so distinct collection names never
/// collide on disk.
pub(crate) fn fs_safe(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for b in name.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'_' | b'-' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

fn collection_dir(base: &Path, name: &str) -> PathBuf {
    base.join(fs_safe(name))
}

/// Save a collection snapshot to disk.
pub async fn save_collection(base_path: &Path, collection: &Collection) -> Result<()> {
    let dir = collection_dir(base_path, collection.name());
    tokio::fs::create_dir_all(&dir).await?;

    let metadata = CollectionMetadata {
        name: collection.name().to_string(),
        dimensions: collection.dimensions(),
        metric: collection.metric().name().to_string(),
        saved_at: Utc::now(),
    };
    let metadata_json = serde_json::to_string_pretty(&metadata)
        .map_err(|e| Error::Persistence(format!("failed to serialize metadata: {}", e)))?;
    tokio::fs::write(dir.join("metadata.json"), metadata_json).await?;

    let vectors: Vec<StoredVector> = collection
        .export_all()
        .into_iter()
        .map(|(id, vector, metadata)| StoredVector {
            id,
            vector,
            metadata,
        })
        .collect();
    let count = vectors.len();
    let vectors_json = serde_json::to_string(&vectors)
        .map_err(|e| Error::Persistence(format!("failed to serialize vectors: {}", e)))?;
    tokio::fs::write(dir.join("vectors.json"), vectors_json).await?;

    info!(name = collection.name(), count, "saved collection snapshot");
    Ok(())
}

/// Load a collection snapshot from disk.
pub async fn load_collection(
    base_path: &Path,
    name: &str,
    max_vectors: usize,
) -> Result<Collection> {
    let dir = collection_dir(base_path, name);
    if !dir.exists() {
        return Err(Error::CollectionNotFound(name.to_string()));
    }

    let metadata_json = tokio::fs::read_to_string(dir.join("metadata.json")).await?;
    let metadata: CollectionMetadata = serde_json::from_str(&metadata_json)
        .map_err(|e| Error::Persistence(format!("failed to parse metadata: {}", e)))?;

    let metric: DistanceMetric = metadata.metric.parse().map_err(Error::Persistence)?;
    let collection = Collection::new(metadata.name.clone(), metadata.dimensions, metric, max_vectors)?;

    let vectors_path = dir.join("vectors.json");
    if vectors_path.exists() {
        let vectors_json = tokio::fs::read_to_string(&vectors_path).await?;
        let vectors: Vec<StoredVector> = serde_json::from_str(&vectors_json)
            .map_err(|e| Error::Persistence(format!("failed to parse vectors: {}", e)))?;

        let count = vectors.len();
        for stored in vectors {
            collection.insert(&stored.id, &stored.vector, stored.metadata)?;
        }
        debug!(name, count, "loaded vectors");
    }

    info!(name, dimensions = metadata.dimensions, "loaded collection");
    Ok(collection)
}

/// Remove a collection's snapshot files.
pub async fn remove_collection(base_path: &Path, name: &str) -> Result<()> {
    let dir = collection_dir(base_path, name);
    if dir.exists() {
        tokio::fs::remove_dir_all(&dir).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fs_safe_passthrough() {
        assert_eq!(fs_safe("plain-name_1.2"), "plain-name_1.2");
    }

    #[test]
    fn test_fs_safe_escapes() {
        assert_eq!(fs_safe("user:alice"), "user%3Aalice");
        assert_eq!(fs_safe("a/b"), "a%2Fb");
        // Injective: escaped forms of distinct names differ.
        assert_ne!(fs_safe("user:a"), fs_safe("user_a"));
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let temp = TempDir::new().unwrap();

        let collection =
            Collection::new("user:test".to_string(), 3, DistanceMetric::Cosine, 0).unwrap();
        collection.insert("v1", &[1.0, 0.0, 0.0], None).unwrap();
        collection
            .insert(
                "v2",
                &[0.0, 1.0, 0.0],
                Some(VectorMetadata::from_pairs([("kind", "fact")])),
            )
            .unwrap();

        save_collection(temp.path(), &collection).await.unwrap();

        let loaded = load_collection(temp.path(), "user:test", 0).await.unwrap();
        assert_eq!(loaded.name(), "user:test");
        assert_eq!(loaded.dimensions(), 3);
        assert_eq!(loaded.len(), 2);

        let (vector, metadata) = loaded.get("v2").unwrap();
        assert_eq!(vector, vec![0.0, 1.0, 0.0]);
        assert_eq!(metadata.unwrap().get_string("kind"), Some("fact"));
    }

    #[tokio::test]
    async fn test_load_missing_collection() {
        let temp = TempDir::new().unwrap();
        let result = load_collection(temp.path(), "nope", 0).await;
        assert!(matches!(result, Err(Error::CollectionNotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_collection() {
        let temp = TempDir::new().unwrap();
        let collection =
            Collection::new("gone".to_string(), 2, DistanceMetric::Cosine, 0).unwrap();
        save_collection(temp.path(), &collection).await.unwrap();

        remove_collection(temp.path(), "gone").await.unwrap();
        assert!(matches!(
            load_collection(temp.path(), "gone", 0).await,
            Err(Error::CollectionNotFound(_))
        ));
    }
}
