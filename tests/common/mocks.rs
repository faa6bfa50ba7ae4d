//! Mock collaborators for testing.
//!
//! The embedder and extractor are external services in production; these
//! mocks make their behavior deterministic and programmable so the memory
//! core can be tested without network access.

use async_trait::async_trait;
use engram::{Embedder, FactExtractor, MemoryError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Deterministic embedder with programmable vectors.
///
/// Texts registered via [`with_mapping`](Self::with_mapping) return their
/// exact vector, which is how tests steer similarity above or below the
/// consolidation threshold. Unregistered texts get a deterministic
/// direction derived from their bytes, so distinct texts rarely collide.
/// Texts registered via [`failing_on`](Self::failing_on) fail to embed.
pub struct StubEmbedder {
    model: String,
    dimensions: usize,
    mappings: Mutex<HashMap<String, Vec<f32>>>,
    failing: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn new(model: &str, dimensions: usize) -> Self {
        Self {
            model: model.to_string(),
            dimensions,
            mappings: Mutex::new(HashMap::new()),
            failing: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Pin the vector returned for an exact text.
    pub fn with_mapping(self, text: &str, vector: Vec<f32>) -> Self {
        self.mappings.lock().insert(text.to_string(), vector);
        self
    }

    /// Make embedding fail for an exact text.
    pub fn failing_on(self, text: &str) -> Self {
        self.failing.lock().push(text.to_string());
        self
    }

    /// Number of embed calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn derive(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for (i, b) in text.bytes().enumerate() {
            vector[i % self.dimensions] += (b as f32) * ((i % 13) as f32 + 1.0);
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing.lock().iter().any(|t| t.as_str() == text) {
            return Err(MemoryError::Embedding(format!(
                "stub refuses to embed: {}",
                text
            )));
        }
        if let Some(vector) = self.mappings.lock().get(text) {
            return Ok(vector.clone());
        }
        Ok(self.derive(text))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Embedder that fails a set number of times before succeeding.
pub struct FlakyEmbedder {
    inner: StubEmbedder,
    failures_remaining: AtomicUsize,
}

impl FlakyEmbedder {
    pub fn new(model: &str, dimensions: usize, failures: usize) -> Self {
        Self {
            inner: StubEmbedder::new(model, dimensions),
            failures_remaining: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(MemoryError::Embedding("transient failure".to_string()));
        }
        self.inner.embed(text).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// Embedder that always fails.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, MemoryError> {
        Err(MemoryError::Embedding("embedder is down".to_string()))
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

/// Extractor returning a fixed candidate list for every turn.
pub struct StubExtractor {
    candidates: Vec<String>,
}

impl StubExtractor {
    /// Always return these candidates.
    pub fn returning(candidates: &[&str]) -> Self {
        Self {
            candidates: candidates.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Return no candidates (a turn with nothing worth remembering).
    pub fn empty() -> Self {
        Self {
            candidates: Vec::new(),
        }
    }
}

#[async_trait]
impl FactExtractor for StubExtractor {
    async fn extract(
        &self,
        _user_input: &str,
        _assistant_response: &str,
    ) -> Result<Vec<String>, MemoryError> {
        Ok(self.candidates.clone())
    }
}

/// Extractor that treats the user input itself as the single candidate.
///
/// Lets scenario tests phrase updates naturally while keeping full control
/// over what gets stored.
pub struct EchoExtractor;

#[async_trait]
impl FactExtractor for EchoExtractor {
    async fn extract(
        &self,
        user_input: &str,
        _assistant_response: &str,
    ) -> Result<Vec<String>, MemoryError> {
        Ok(vec![user_input.to_string()])
    }
}

/// Extractor that always fails.
pub struct FailingExtractor;

#[async_trait]
impl FactExtractor for FailingExtractor {
    async fn extract(
        &self,
        _user_input: &str,
        _assistant_response: &str,
    ) -> Result<Vec<String>, MemoryError> {
        Err(MemoryError::Extraction("extractor is down".to_string()))
    }
}
