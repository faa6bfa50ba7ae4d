//! Memory manager: orchestration of extraction, embedding, and storage.

use crate::config::MemoryConfig;
use crate::embed::Embedder;
use crate::extract::FactExtractor;
use crate::store::MemoryStore;
use crate::types::{
    CandidateFailure, MemoryError, Result, ScoredMemory, SourceTurn, UpdateReport,
};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Thin coordination layer over the memory store.
///
/// On `update`: extract candidate statements, embed them, and hand each to
/// the store's consolidation. On `get`: embed the query and delegate to
/// ranked search. The manager holds no persistent state of its own; all
/// collaborators are injected, so it is cheap to clone and safe to share.
#[derive(Clone)]
pub struct MemoryManager {
    config: MemoryConfig,
    embedder: Arc<dyn Embedder>,
    extractor: Arc<dyn FactExtractor>,
    store: Arc<dyn MemoryStore>,
}

impl MemoryManager {
    /// Create a manager from explicit collaborators.
    pub fn new(
        config: MemoryConfig,
        embedder: Arc<dyn Embedder>,
        extractor: Arc<dyn FactExtractor>,
        store: Arc<dyn MemoryStore>,
    ) -> Self {
        Self {
            config,
            embedder,
            extractor,
            store,
        }
    }

    /// Ingest one dialogue turn into the user's memory.
    ///
    /// Extraction failure aborts the turn. Embedding and storage are
    /// per-candidate: statements that succeed are stored even when a
    /// sibling fails, and every failure is aggregated into the returned
    /// report rather than swallowed. Aborting the call mid-way leaves all
    /// candidates applied so far durable and nothing half-written.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn update(
        &self,
        user_id: &str,
        user_input: &str,
        assistant_response: &str,
    ) -> Result<UpdateReport> {
        validate_user_id(user_id)?;

        let candidates = self
            .extractor
            .extract(user_input, assistant_response)
            .await?;
        if candidates.is_empty() {
            debug!("turn carried no durable facts");
            return Ok(UpdateReport::default());
        }

        let embeddings = join_all(
            candidates
                .iter()
                .map(|candidate| self.embed_with_retry(candidate)),
        )
        .await;

        let source = SourceTurn::new(user_input, assistant_response);
        let mut report = UpdateReport::default();

        for (candidate, embedded) in candidates.into_iter().zip(embeddings) {
            let embedding = match embedded {
                Ok(embedding) => embedding,
                Err(e) => {
                    warn!(error = %e, "dropping candidate that failed to embed");
                    report.failures.push(CandidateFailure {
                        candidate,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            match self
                .store
                .upsert(
                    user_id,
                    &candidate,
                    embedding,
                    self.embedder.model_name(),
                    source.clone(),
                )
                .await
            {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => {
                    warn!(error = %e, "dropping candidate that failed to store");
                    report.failures.push(CandidateFailure {
                        candidate,
                        error: e.to_string(),
                    });
                }
            }
        }

        debug!(
            stored = report.stored(),
            merged = report.merged(),
            failed = report.failures.len(),
            "turn ingested"
        );
        Ok(report)
    }

    /// Retrieve the `top_k` memories most relevant to `query`.
    ///
    /// A failed query embedding aborts the whole call; there is no partial
    /// result. An unknown user simply has no memory yet and yields an
    /// empty sequence.
    #[instrument(skip_all, fields(user_id = %user_id, top_k = top_k))]
    pub async fn get(&self, user_id: &str, query: &str, top_k: usize) -> Result<Vec<ScoredMemory>> {
        validate_user_id(user_id)?;
        if query.trim().is_empty() {
            return Err(MemoryError::InvalidArgument(
                "query must not be empty".to_string(),
            ));
        }
        if top_k == 0 {
            return Err(MemoryError::InvalidArgument(
                "top_k must be a positive integer".to_string(),
            ));
        }

        let query_embedding = self.embedder.embed(query).await?;
        self.store
            .search(
                user_id,
                &query_embedding,
                self.embedder.model_name(),
                top_k,
            )
            .await
    }

    /// Forget one record. Returns whether a record was removed.
    pub async fn delete(&self, user_id: &str, record_id: &str) -> Result<bool> {
        validate_user_id(user_id)?;
        self.store.delete(user_id, record_id).await
    }

    /// Number of records in the user's memory set.
    pub async fn count(&self, user_id: &str) -> Result<usize> {
        validate_user_id(user_id)?;
        self.store.count(user_id).await
    }

    /// Re-embed records produced under an older embedder model with the
    /// active one, making them searchable again. Returns the number of
    /// records migrated.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn reembed_user(&self, user_id: &str) -> Result<usize> {
        validate_user_id(user_id)?;

        let model = self.embedder.model_name().to_string();
        let stale = self.store.stale_records(user_id, &model).await?;
        let total = stale.len();

        for record in stale {
            let embedding = self.embedder.embed(&record.text).await?;
            self.store
                .replace_embedding(user_id, &record.id, embedding, &model)
                .await?;
        }

        if total > 0 {
            debug!(migrated = total, "re-embedded stale records");
        }
        Ok(total)
    }

    /// Flush the store snapshot to durable storage.
    pub async fn persist(&self) -> Result<()> {
        self.store.persist().await
    }

    async fn embed_with_retry(&self, text: &str) -> Result<Vec<f32>> {
        let attempts = self.config.ingest.embed_retries + 1;
        let mut last_error = None;

        for attempt in 0..attempts {
            match self.embedder.embed(text).await {
                Ok(embedding) => return Ok(embedding),
                Err(e) => {
                    if attempt + 1 < attempts {
                        debug!(attempt, error = %e, "embedding attempt failed, retrying");
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| MemoryError::Embedding("no embedding attempts made".to_string())))
    }
}

fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(MemoryError::InvalidArgument(
            "user_id must not be empty".to_string(),
        ));
    }
    Ok(())
}
