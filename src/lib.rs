//! # Engram
//!
//! Per-user long-term memory for conversational agents: dialogue turns are
//! distilled into atomic statements, embedded, consolidated against the
//! user's existing memories, and later retrieved by semantic similarity.
//!
//! ## Overview
//!
//! Two operations make up the public surface:
//!
//! 1. **`update(user_id, user_input, assistant_response)`** - extract the
//!    facts worth remembering from one dialogue turn and fold them into the
//!    user's memory set, merging near-duplicates instead of accumulating
//!    them.
//! 2. **`get(user_id, query, top_k)`** - return the `top_k` memories most
//!    relevant to a query, ranked by similarity with a recency tie-break.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use engram::{
//!     EmbedderProvider, ExtractorProvider, MemoryConfig, MemoryManager, StoreProvider,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), engram::MemoryError> {
//!     let config = MemoryConfig::from_env()?;
//!     let embedder = EmbedderProvider::from_env().create_embedder()?;
//!     let extractor = ExtractorProvider::from_env().create_extractor()?;
//!     let store = StoreProvider::from_env()
//!         .create_store(config.consolidation.clone())
//!         .await?;
//!
//!     let memory = MemoryManager::new(config, embedder, extractor, store);
//!
//!     memory
//!         .update("user-1", "I switched to green tea", "Noted!")
//!         .await?;
//!
//!     let recalled = memory.get("user-1", "what does the user drink?", 3).await?;
//!     for m in &recalled {
//!         println!("{:.2}  {}", m.score, m.record.text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`manager`] - orchestration (`update` / `get` / `delete`)
//! - [`store`] - record ownership, consolidation, ranked search
//! - [`embed`] - embedding trait, HTTP adapters, caching
//! - [`extract`] - fact extraction trait and LLM adapter
//! - [`config`] - immutable configuration values
//! - [`prompt`] - formatting recalled memories for prompts
//! - [`types`] - data model and error taxonomy
//!
//! ## Architecture
//!
//! The embedder and extractor are external collaborators consumed through
//! narrow async traits; the store owns every record. Writes for one user
//! are serialized behind a per-user lock, users never contend with each
//! other, and reads work on consistent snapshots. Configuration is passed
//! in as a value; nothing in the core reads ambient process state.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// Immutable configuration values.
pub mod config;
/// Embedding generation and caching.
pub mod embed;
/// Fact extraction from dialogue turns.
pub mod extract;
/// Memory manager orchestration.
pub mod manager;
/// Prompt formatting for recalled memories.
pub mod prompt;
/// Memory storage backends.
pub mod store;
/// Core types (records, reports, errors).
pub mod types;

// Re-export commonly used types
pub use config::{ConsolidationConfig, EvictionPolicy, IngestConfig, MemoryConfig};
pub use embed::{CachedEmbedder, Embedder, EmbedderProvider, OllamaEmbedder, OpenAiEmbedder};
pub use extract::{ExtractorProvider, FactExtractor, LlmFactExtractor};
pub use manager::MemoryManager;
pub use store::{MemoryStore, StoreProvider, VectorMemoryStore};
pub use types::{
    MemoryError, MemoryRecord, Result, ScoredMemory, SourceTurn, UpdateReport, UpsertOutcome,
};
