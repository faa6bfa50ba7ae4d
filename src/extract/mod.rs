//! Fact extraction.
//!
//! A dialogue turn is not a memory: before anything is stored, the turn is
//! distilled into zero or more atomic statements worth remembering. The
//! core consumes extraction through the [`FactExtractor`] trait; the
//! provided implementation delegates to an LLM behind an OpenAI-compatible
//! chat endpoint.

mod llm;

pub use llm::LlmFactExtractor;

use crate::types::Result;
use async_trait::async_trait;
use std::env;
use std::sync::Arc;

/// Maps a dialogue turn to candidate memory statements.
///
/// An empty result is normal (the turn carried no durable fact). Failures
/// surface as [`MemoryError::Extraction`](crate::MemoryError::Extraction).
#[async_trait]
pub trait FactExtractor: Send + Sync {
    /// Extract atomic statements from one dialogue turn.
    async fn extract(&self, user_input: &str, assistant_response: &str) -> Result<Vec<String>>;
}

/// Extractor backend selection.
#[derive(Debug, Clone)]
pub enum ExtractorProvider {
    /// OpenAI-compatible chat endpoint.
    OpenAi {
        /// API key sent as a bearer token.
        api_key: String,
        /// Base URL, e.g. `https://api.openai.com/v1`.
        api_base: String,
        /// Chat model used for extraction.
        model: String,
    },
    /// Ollama server, reached through its OpenAI-compatible `/v1` surface.
    Ollama {
        /// Ollama server URL, e.g. `http://localhost:11434`.
        base_url: String,
        /// Chat model used for extraction.
        model: String,
    },
}

impl ExtractorProvider {
    /// Create an extractor for this provider.
    pub fn create_extractor(&self) -> Result<Arc<dyn FactExtractor>> {
        match self {
            ExtractorProvider::OpenAi {
                api_key,
                api_base,
                model,
            } => Ok(Arc::new(LlmFactExtractor::new(
                api_base.clone(),
                Some(api_key.clone()),
                model.clone(),
            ))),
            ExtractorProvider::Ollama { base_url, model } => Ok(Arc::new(LlmFactExtractor::new(
                format!("{}/v1", base_url.trim_end_matches('/')),
                None,
                model.clone(),
            ))),
        }
    }

    /// Select a provider from environment variables.
    ///
    /// `OPENAI_API_KEY` selects the OpenAI-compatible backend (with
    /// `EXTRACTION_API_BASE` and `EXTRACTION_MODEL` overrides); otherwise
    /// Ollama at `OLLAMA_URL` is assumed.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        if let Ok(api_key) = env::var("OPENAI_API_KEY") {
            if !api_key.is_empty() {
                return ExtractorProvider::OpenAi {
                    api_key,
                    api_base: env::var("EXTRACTION_API_BASE")
                        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                    model: env::var("EXTRACTION_MODEL")
                        .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
                };
            }
        }

        ExtractorProvider::Ollama {
            base_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            model: env::var("EXTRACTION_MODEL").unwrap_or_else(|_| "llama3.2".to_string()),
        }
    }
}
