//! LLM-backed fact extraction.

use crate::extract::FactExtractor;
use crate::types::{MemoryError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const EXTRACTION_SYSTEM_PROMPT: &str = "\
You distill dialogue into long-term memory for an assistant. Given one \
exchange between a user and an assistant, extract the facts about the user \
that are worth remembering across conversations: stated preferences, \
biographical details, goals, constraints, decisions. Each fact must be a \
short, atomic, self-contained statement in the third person. Ignore \
pleasantries, one-off requests, and anything about the assistant itself.

Respond with a JSON array of strings and nothing else. Respond with [] if \
the exchange contains nothing worth remembering.";

/// Fact extractor that prompts a chat model behind an OpenAI-compatible
/// `/chat/completions` endpoint.
pub struct LlmFactExtractor {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

impl LlmFactExtractor {
    /// Create a new extractor.
    ///
    /// `api_key` is optional; local servers (Ollama's `/v1` surface) accept
    /// unauthenticated requests.
    pub fn new(api_base: String, api_key: Option<String>, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base,
            api_key,
            model,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn complete(&self, turn: &str) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.api_base.trim_end_matches('/')
        );

        let mut request = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&ChatRequest {
                model: &self.model,
                messages: vec![
                    ChatMessage {
                        role: "system",
                        content: EXTRACTION_SYSTEM_PROMPT.to_string(),
                    },
                    ChatMessage {
                        role: "user",
                        content: turn.to_string(),
                    },
                ],
                temperature: 0.0,
            });
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MemoryError::Extraction(format!("extraction request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::Extraction(format!(
                "extraction endpoint returned {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::Extraction(format!("malformed chat response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| MemoryError::Extraction("chat response had no choices".to_string()))
    }
}

#[async_trait]
impl FactExtractor for LlmFactExtractor {
    async fn extract(&self, user_input: &str, assistant_response: &str) -> Result<Vec<String>> {
        if user_input.trim().is_empty() && assistant_response.trim().is_empty() {
            return Err(MemoryError::Extraction("empty dialogue turn".to_string()));
        }

        let turn = format!(
            "User: {}\nAssistant: {}",
            user_input.trim(),
            assistant_response.trim()
        );
        let content = self.complete(&turn).await?;
        let candidates = parse_candidates(&content)?;

        debug!(model = %self.model, count = candidates.len(), "extracted candidates");
        Ok(candidates)
    }
}

/// Parse the model's reply into candidate statements.
///
/// Models wrap JSON in code fences often enough that stripping them is part
/// of the contract here; anything else that fails to parse as a JSON array
/// of strings is an extraction failure.
fn parse_candidates(content: &str) -> Result<Vec<String>> {
    let trimmed = strip_code_fences(content.trim());

    let parsed: Vec<String> = serde_json::from_str(trimmed).map_err(|e| {
        MemoryError::Extraction(format!("extractor returned unparseable output: {}", e))
    })?;

    Ok(parsed
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

fn strip_code_fences(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("```") else {
        return content;
    };
    // Drop an optional language tag on the opening fence line.
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    rest.strip_suffix("```").map(str::trim).unwrap_or(rest)
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_plain_array() {
        let candidates = parse_candidates(r#"["likes tea", "works remotely"]"#).unwrap();
        assert_eq!(candidates, vec!["likes tea", "works remotely"]);
    }

    #[test]
    fn test_parse_fenced_array() {
        let candidates =
            parse_candidates("```json\n[\"likes tea\"]\n```").unwrap();
        assert_eq!(candidates, vec!["likes tea"]);
    }

    #[test]
    fn test_parse_empty_array() {
        assert!(parse_candidates("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_drops_blank_entries() {
        let candidates = parse_candidates(r#"["likes tea", "  "]"#).unwrap();
        assert_eq!(candidates, vec!["likes tea"]);
    }

    #[test]
    fn test_parse_prose_is_an_error() {
        let err = parse_candidates("The user likes tea.").unwrap_err();
        assert!(matches!(err, MemoryError::Extraction(_)));
    }

    fn chat_reply(content: &str) -> serde_json::Value {
        json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    #[tokio::test]
    async fn test_extract_roundtrip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_reply(r#"["prefers green tea", "lives in Lisbon"]"#)),
            )
            .mount(&server)
            .await;

        let extractor = LlmFactExtractor::new(server.uri(), None, "llama3.2".to_string());
        let candidates = extractor
            .extract("I moved to Lisbon and I love green tea", "Noted!")
            .await
            .unwrap();

        assert_eq!(candidates, vec!["prefers green tea", "lives in Lisbon"]);
    }

    #[tokio::test]
    async fn test_empty_turn_rejected_before_request() {
        let server = MockServer::start().await;
        let extractor = LlmFactExtractor::new(server.uri(), None, "llama3.2".to_string());

        let err = extractor.extract("  ", "").await.unwrap_err();
        assert!(matches!(err, MemoryError::Extraction(_)));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_extraction_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let extractor = LlmFactExtractor::new(server.uri(), None, "llama3.2".to_string());
        let err = extractor.extract("hello", "world").await.unwrap_err();
        assert!(matches!(err, MemoryError::Extraction(_)));
        assert!(err.to_string().contains("429"));
    }
}
