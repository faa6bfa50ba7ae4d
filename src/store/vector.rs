//! Vector-backed memory store.
//!
//! Records live in a per-user map guarded by a `RwLock`; their embeddings
//! are additionally indexed in an [`engram_vector`] collection per
//! `(user, embedder model)` pair, so search never sees vectors from a
//! different model or dimensionality. Both structures are mutated only
//! while holding that user's write lock, which is what makes two
//! concurrent upserts unable to miss each other's near-duplicate.

use crate::config::ConsolidationConfig;
use crate::store::MemoryStore;
use crate::types::{
    MemoryError, MemoryRecord, Result, ScoredMemory, SourceTurn, UpsertOutcome,
};
use async_trait::async_trait;
use engram_vector::{Config as VectorConfig, VectorDb};
use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// user_id -> record_id -> record.
type RecordMap = HashMap<String, HashMap<String, MemoryRecord>>;

fn namespace(user_id: &str, embedder_model: &str) -> String {
    format!("user:{}:{}", user_id, embedder_model)
}

fn store_io_error(context: &str, e: impl std::fmt::Display) -> MemoryError {
    MemoryError::Store(format!("{}: {}", context, e))
}

/// The default [`MemoryStore`] implementation.
pub struct VectorMemoryStore {
    db: VectorDb,
    records: RwLock<RecordMap>,
    /// Per-user write locks; the keyed form preserves cross-user
    /// parallelism that a single store-wide lock would destroy.
    user_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    config: ConsolidationConfig,
    path: Option<PathBuf>,
}

impl VectorMemoryStore {
    /// Create an ephemeral in-memory store.
    pub async fn in_memory(config: ConsolidationConfig) -> Result<Self> {
        let db = VectorDb::open(VectorConfig::memory()).await?;
        Ok(Self {
            db,
            records: RwLock::new(HashMap::new()),
            user_locks: Mutex::new(HashMap::new()),
            config,
            path: None,
        })
    }

    /// Open a store persisted under `path`, loading any existing snapshot.
    pub async fn open(config: ConsolidationConfig, path: PathBuf) -> Result<Self> {
        let db = VectorDb::open(VectorConfig::persistent(path.join("vectors"))).await?;
        let store = Self {
            db,
            records: RwLock::new(HashMap::new()),
            user_locks: Mutex::new(HashMap::new()),
            config,
            path: Some(path),
        };

        store.load_records().await?;
        store.reconcile().await?;
        Ok(store)
    }

    fn user_lock(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.user_locks
            .lock()
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    async fn load_records(&self) -> Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        let file = path.join("records.json");
        if !file.exists() {
            return Ok(());
        }

        let data = tokio::fs::read_to_string(&file)
            .await
            .map_err(|e| store_io_error("failed to read records snapshot", e))?;
        let loaded: RecordMap = serde_json::from_str(&data)
            .map_err(|e| store_io_error("failed to parse records snapshot", e))?;

        let users = loaded.len();
        let total: usize = loaded.values().map(|s| s.len()).sum();
        *self.records.write() = loaded;
        info!(users, records = total, "loaded records snapshot");
        Ok(())
    }

    /// Re-index any record whose embedding is missing from its vector
    /// collection. `records.json` is the authoritative snapshot; vector
    /// snapshots are an open-time optimization that may lag behind it.
    async fn reconcile(&self) -> Result<()> {
        let all: Vec<(String, String, String, Vec<f32>)> = {
            let records = self.records.read();
            records
                .iter()
                .flat_map(|(user_id, set)| {
                    set.values().map(|r| {
                        (
                            user_id.clone(),
                            r.id.clone(),
                            r.embedder_model.clone(),
                            r.embedding.clone(),
                        )
                    })
                })
                .collect()
        };

        let mut rebuilt = 0usize;
        for (user_id, record_id, model, embedding) in all {
            let ns = namespace(&user_id, &model);
            let collection = self
                .db
                .get_or_create_collection(&ns, embedding.len(), self.config.metric)
                .await?;
            if !collection.contains(&record_id) {
                collection.insert(&record_id, &embedding, None)?;
                rebuilt += 1;
            }
        }

        if rebuilt > 0 {
            warn!(rebuilt, "re-indexed records missing from vector snapshots");
        }
        Ok(())
    }

    /// Write the records snapshot. No-op for in-memory stores.
    async fn persist_records(&self) -> Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };

        let snapshot = {
            let records = self.records.read();
            serde_json::to_string(&*records)
                .map_err(|e| store_io_error("failed to serialize records", e))?
        };

        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| store_io_error("failed to create data directory", e))?;
        tokio::fs::write(path.join("records.json"), snapshot)
            .await
            .map_err(|e| store_io_error("failed to write records snapshot", e))?;
        Ok(())
    }

    /// Evict the least-recently-updated record if the user's set is at
    /// capacity. Caller holds the user's write lock.
    async fn evict_if_full(&self, user_id: &str) -> Result<()> {
        let Some(max) = self.config.eviction.max_records() else {
            return Ok(());
        };

        let victim = {
            let records = self.records.read();
            records
                .get(user_id)
                .filter(|set| set.len() >= max)
                .and_then(|set| {
                    set.values()
                        .min_by(|a, b| {
                            a.updated_at
                                .cmp(&b.updated_at)
                                .then_with(|| a.id.cmp(&b.id))
                        })
                        .map(|r| (r.id.clone(), r.embedder_model.clone()))
                })
        };

        let Some((victim_id, victim_model)) = victim else {
            return Ok(());
        };

        if let Some(set) = self.records.write().get_mut(user_id) {
            set.remove(&victim_id);
        }
        let ns = namespace(user_id, &victim_model);
        if self.db.collection_exists(&ns) {
            self.db.delete(&ns, &victim_id).await?;
        }
        warn!(user_id, record_id = %victim_id, "memory set at capacity, evicted oldest record");
        Ok(())
    }
}

#[async_trait]
impl MemoryStore for VectorMemoryStore {
    #[instrument(skip_all, fields(user_id = %user_id))]
    async fn upsert(
        &self,
        user_id: &str,
        candidate: &str,
        embedding: Vec<f32>,
        embedder_model: &str,
        source: SourceTurn,
    ) -> Result<UpsertOutcome> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let ns = namespace(user_id, embedder_model);
        let collection = self
            .db
            .get_or_create_collection(&ns, embedding.len(), self.config.metric)
            .await?;

        // The collection holds only same-model vectors, so its exact top-1
        // is the maximum similarity the consolidation rule needs.
        let merge_target = collection
            .search(&embedding, 1)?
            .into_iter()
            .next()
            .filter(|hit| hit.score >= self.config.threshold);

        if let Some(hit) = merge_target {
            let merged = {
                let mut records = self.records.write();
                let record = records
                    .get_mut(user_id)
                    .and_then(|set| set.get_mut(&hit.id))
                    .ok_or_else(|| {
                        MemoryError::Store(format!(
                            "record {} is indexed but missing from the record map",
                            hit.id
                        ))
                    })?;
                record.absorb(candidate, embedding, embedder_model, source);
                record.clone()
            };
            collection.update(&merged.id, &merged.embedding, None)?;
            self.persist_records().await?;

            debug!(record_id = %merged.id, score = hit.score, "merged candidate into existing record");
            return Ok(UpsertOutcome {
                record: merged,
                merged: true,
            });
        }

        self.evict_if_full(user_id).await?;

        let record = MemoryRecord::new(user_id, candidate, embedding, embedder_model, source);
        collection.insert(&record.id, &record.embedding, None)?;
        {
            let mut records = self.records.write();
            records
                .entry(user_id.to_string())
                .or_default()
                .insert(record.id.clone(), record.clone());
        }
        self.persist_records().await?;

        debug!(record_id = %record.id, "inserted new record");
        Ok(UpsertOutcome {
            record,
            merged: false,
        })
    }

    #[instrument(skip_all, fields(user_id = %user_id, top_k = top_k))]
    async fn search(
        &self,
        user_id: &str,
        query_embedding: &[f32],
        embedder_model: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredMemory>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let ns = namespace(user_id, embedder_model);
        if !self.db.collection_exists(&ns) {
            return Ok(Vec::new());
        }
        let total = self.db.count(&ns)?;
        if total == 0 {
            return Ok(Vec::new());
        }

        // Fetch the full exact ranking, then apply the recency tie-break,
        // which only the record map knows about.
        let hits = self.db.search(&ns, query_embedding, total).await?;

        let mut scored: Vec<ScoredMemory> = {
            let records = self.records.read();
            let Some(set) = records.get(user_id) else {
                return Ok(Vec::new());
            };
            hits.into_iter()
                .filter_map(|hit| {
                    set.get(&hit.id).map(|record| ScoredMemory {
                        record: record.clone(),
                        score: hit.score,
                    })
                })
                .collect()
        };

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.record.updated_at.cmp(&a.record.updated_at))
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        scored.truncate(top_k);

        debug!(count = scored.len(), "search completed");
        Ok(scored)
    }

    #[instrument(skip_all, fields(user_id = %user_id, record_id = %record_id))]
    async fn delete(&self, user_id: &str, record_id: &str) -> Result<bool> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let removed = {
            let mut records = self.records.write();
            records
                .get_mut(user_id)
                .and_then(|set| set.remove(record_id))
        };

        match removed {
            Some(record) => {
                let ns = namespace(user_id, &record.embedder_model);
                if self.db.collection_exists(&ns) {
                    self.db.delete(&ns, record_id).await?;
                }
                self.persist_records().await?;
                debug!("deleted record");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count(&self, user_id: &str) -> Result<usize> {
        Ok(self.records.read().get(user_id).map_or(0, |set| set.len()))
    }

    async fn stale_records(
        &self,
        user_id: &str,
        embedder_model: &str,
    ) -> Result<Vec<MemoryRecord>> {
        let mut stale: Vec<MemoryRecord> = {
            let records = self.records.read();
            records
                .get(user_id)
                .map(|set| {
                    set.values()
                        .filter(|r| r.embedder_model != embedder_model)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };
        stale.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(stale)
    }

    #[instrument(skip_all, fields(user_id = %user_id, record_id = %record_id))]
    async fn replace_embedding(
        &self,
        user_id: &str,
        record_id: &str,
        embedding: Vec<f32>,
        embedder_model: &str,
    ) -> Result<bool> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let old_model = {
            let records = self.records.read();
            records
                .get(user_id)
                .and_then(|set| set.get(record_id))
                .map(|r| r.embedder_model.clone())
        };
        let Some(old_model) = old_model else {
            return Ok(false);
        };

        // Index under the new model before dropping the old vector, so a
        // failure part-way leaves the record searchable under one model.
        let ns = namespace(user_id, embedder_model);
        let collection = self
            .db
            .get_or_create_collection(&ns, embedding.len(), self.config.metric)
            .await?;
        collection.insert(record_id, &embedding, None)?;

        if old_model != embedder_model {
            let old_ns = namespace(user_id, &old_model);
            if self.db.collection_exists(&old_ns) {
                self.db.delete(&old_ns, record_id).await?;
            }
        }

        {
            let mut records = self.records.write();
            if let Some(record) = records
                .get_mut(user_id)
                .and_then(|set| set.get_mut(record_id))
            {
                record.embedding = embedding;
                record.embedder_model = embedder_model.to_string();
            }
        }
        self.persist_records().await?;

        debug!(from = %old_model, to = %embedder_model, "replaced embedding");
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn persist(&self) -> Result<()> {
        self.persist_records().await?;
        self.db.persist().await?;
        Ok(())
    }
}
