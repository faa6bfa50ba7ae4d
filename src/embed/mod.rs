//! Embedding generation.
//!
//! The memory core consumes embeddings through the [`Embedder`] trait and
//! never assumes a particular backend. Two HTTP adapters are provided
//! (OpenAI-compatible APIs and Ollama), plus a caching wrapper that avoids
//! re-vectorizing unchanged text.

pub mod cache;
mod ollama;
mod openai;

pub use cache::{CacheConfig, CacheStats, EmbeddingCache, LruEmbeddingCache, NoOpCache};
pub use ollama::OllamaEmbedder;
pub use openai::OpenAiEmbedder;

use crate::types::{MemoryError, Result};
use async_trait::async_trait;
use std::env;
use std::sync::Arc;
use tracing::debug;

/// Maps text to a fixed-length vector.
///
/// Implementations must be deterministic for a given model version and
/// fail with [`MemoryError::Embedding`] on invalid input or transport
/// failure; a timeout is a failure, never a silent empty result.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts. The default implementation loops; adapters
    /// whose backend supports batching override this.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Identifier of the model producing these embeddings. Stored on every
    /// record so that stale embeddings can be detected and migrated.
    fn model_name(&self) -> &str;
}

/// Embedder backend selection.
#[derive(Debug, Clone)]
pub enum EmbedderProvider {
    /// OpenAI-compatible embeddings endpoint (`{api_base}/embeddings`).
    OpenAi {
        /// API key sent as a bearer token.
        api_key: String,
        /// Base URL, e.g. `https://api.openai.com/v1`.
        api_base: String,
        /// Embedding model name.
        model: String,
    },
    /// Ollama embeddings endpoint (`{base_url}/api/embeddings`).
    Ollama {
        /// Ollama server URL, e.g. `http://localhost:11434`.
        base_url: String,
        /// Embedding model name.
        model: String,
    },
}

impl EmbedderProvider {
    /// Create an embedder for this provider.
    pub fn create_embedder(&self) -> Result<Arc<dyn Embedder>> {
        match self {
            EmbedderProvider::OpenAi {
                api_key,
                api_base,
                model,
            } => Ok(Arc::new(OpenAiEmbedder::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
            ))),
            EmbedderProvider::Ollama { base_url, model } => {
                Ok(Arc::new(OllamaEmbedder::new(base_url.clone(), model.clone())))
            }
        }
    }

    /// Select a provider from environment variables.
    ///
    /// `OPENAI_API_KEY` selects the OpenAI-compatible backend (with
    /// `EMBEDDING_API_BASE` and `EMBEDDING_MODEL` overrides); otherwise
    /// Ollama at `OLLAMA_URL` is assumed.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        if let Ok(api_key) = env::var("OPENAI_API_KEY") {
            if !api_key.is_empty() {
                return EmbedderProvider::OpenAi {
                    api_key,
                    api_base: env::var("EMBEDDING_API_BASE")
                        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                    model: env::var("EMBEDDING_MODEL")
                        .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
                };
            }
        }

        EmbedderProvider::Ollama {
            base_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            model: env::var("EMBEDDING_MODEL").unwrap_or_else(|_| "nomic-embed-text".to_string()),
        }
    }
}

/// An [`Embedder`] wrapper that consults a cache before the backend.
///
/// Cache keys include the model name, so switching embedders never serves
/// vectors from the wrong model.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Arc<dyn EmbeddingCache>,
}

impl CachedEmbedder {
    /// Wrap an embedder with a cache.
    pub fn new(inner: Arc<dyn Embedder>, cache: Arc<dyn EmbeddingCache>) -> Self {
        Self { inner, cache }
    }

    /// Wrap an embedder with a default LRU cache.
    pub fn with_default_cache(inner: Arc<dyn Embedder>) -> Self {
        Self::new(inner, Arc::new(LruEmbeddingCache::with_defaults()))
    }

    /// Cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = self.cache.compute_key(text, self.inner.model_name());
        if let Some(hit) = self.cache.get(&key) {
            debug!(model = self.inner.model_name(), "embedding cache hit");
            return Ok(hit);
        }

        let embedding = self.inner.embed(text).await?;
        self.cache.set(&key, embedding.clone());
        Ok(embedding)
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
