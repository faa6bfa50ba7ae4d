//! Core types: the memory data model and the error taxonomy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============= Memory Types =============

/// Reference to the dialogue turn a memory was derived from.
///
/// Kept for provenance and debugging; the retrieval unit is always the
/// distilled [`MemoryRecord::text`], never the raw turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTurn {
    /// What the user said.
    pub user_input: String,
    /// What the assistant answered.
    pub assistant_response: String,
    /// When the turn was ingested.
    pub recorded_at: DateTime<Utc>,
}

impl SourceTurn {
    /// Create a source turn stamped with the current time.
    pub fn new(user_input: impl Into<String>, assistant_response: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            assistant_response: assistant_response.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// An atomic, durable statement derived from dialogue, with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique record identifier (UUID v4) within the user's namespace.
    pub id: String,
    /// Owning namespace; records are never shared across users.
    pub user_id: String,
    /// The atomic statement. This is the unit of retrieval.
    pub text: String,
    /// Embedding of `text`, produced by `embedder_model`.
    pub embedding: Vec<f32>,
    /// Model that produced `embedding`. Records whose model differs from
    /// the active embedder are excluded from search until re-embedded.
    pub embedder_model: String,
    /// When the record was first created.
    pub created_at: DateTime<Utc>,
    /// When the record was last created or merged into.
    pub updated_at: DateTime<Utc>,
    /// Originating dialogue turns, oldest first.
    pub source_turns: Vec<SourceTurn>,
}

impl MemoryRecord {
    /// Create a fresh record from a candidate statement.
    pub fn new(
        user_id: impl Into<String>,
        text: impl Into<String>,
        embedding: Vec<f32>,
        embedder_model: impl Into<String>,
        source: SourceTurn,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            text: text.into(),
            embedding,
            embedder_model: embedder_model.into(),
            created_at: now,
            updated_at: now,
            source_turns: vec![source],
        }
    }

    /// Merge a near-duplicate candidate into this record.
    ///
    /// The longer statement keeps the `text` slot; at equal length the
    /// newer candidate wins. `embedding` and `embedder_model` are replaced
    /// together with `text` and only then, so a record never carries an
    /// embedding for a statement it no longer holds. Provenance and
    /// `updated_at` always advance.
    pub fn absorb(
        &mut self,
        candidate: &str,
        embedding: Vec<f32>,
        embedder_model: &str,
        source: SourceTurn,
    ) {
        if candidate.len() >= self.text.len() {
            self.text = candidate.to_string();
            self.embedding = embedding;
            self.embedder_model = embedder_model.to_string();
        }
        self.source_turns.push(source);
        self.updated_at = Utc::now();
    }
}

/// A memory record together with its similarity to a query embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredMemory {
    /// The matched record.
    pub record: MemoryRecord,
    /// Similarity score; higher is more relevant.
    pub score: f32,
}

// ============= Update Reporting =============

/// Outcome of consolidating one candidate statement.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    /// The record as stored (fresh, or the merge target after absorption).
    pub record: MemoryRecord,
    /// Whether the candidate was merged into an existing record.
    pub merged: bool,
}

/// A candidate that could not be ingested.
#[derive(Debug, Clone)]
pub struct CandidateFailure {
    /// The candidate statement that failed.
    pub candidate: String,
    /// Why it failed.
    pub error: String,
}

/// Result of one `update` call.
///
/// Ingestion is per-candidate: statements that succeeded are stored even
/// when siblings failed, and the failures are surfaced here rather than
/// swallowed.
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    /// Successfully consolidated candidates, in extraction order.
    pub outcomes: Vec<UpsertOutcome>,
    /// Candidates dropped due to embedding or store failures.
    pub failures: Vec<CandidateFailure>,
}

impl UpdateReport {
    /// Number of candidates stored (merged or inserted).
    pub fn stored(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of candidates merged into existing records.
    pub fn merged(&self) -> usize {
        self.outcomes.iter().filter(|o| o.merged).count()
    }

    /// Whether every extracted candidate was ingested.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

// ============= Error Types =============

/// Errors surfaced by the memory core.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// The fact extractor failed to process a dialogue turn.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// The embedder failed to vectorize text.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Persistence-layer failure (I/O, serialization, index).
    #[error("Store error: {0}")]
    Store(String),

    /// Caller-supplied argument was rejected before any collaborator call.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<engram_vector::Error> for MemoryError {
    fn from(e: engram_vector::Error) -> Self {
        MemoryError::Store(e.to_string())
    }
}

/// Result type for the memory core.
pub type Result<T> = std::result::Result<T, MemoryError>;
