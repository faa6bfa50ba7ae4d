//! Formatting recalled memories for LLM prompts.
//!
//! `get` returns structured [`ScoredMemory`] values; callers that feed the
//! result straight into a system prompt use these helpers.

use crate::types::ScoredMemory;

/// Maximum number of memories to include in a prompt to avoid token
/// overflow.
pub const MAX_MEMORIES_IN_PROMPT: usize = 20;

/// Formats recalled memories into a string suitable for inclusion in a
/// system prompt.
///
/// Returns an empty string when there is nothing to include, so callers
/// can append the result unconditionally.
pub fn format_memories_for_prompt(memories: &[ScoredMemory]) -> String {
    let lines: Vec<String> = memories
        .iter()
        .take(MAX_MEMORIES_IN_PROMPT)
        .map(|m| format!("- {}", m.record.text))
        .collect();

    if lines.is_empty() {
        String::new()
    } else {
        format!("Known about the user:\n{}", lines.join("\n"))
    }
}

/// Estimates token count for a text (rough approximation).
///
/// Uses ~4 characters per token, which is close enough for budgeting
/// English prompt sections.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Truncates a ranked memory list to fit within a token budget.
///
/// Memories are kept in rank order; the first one that would overflow the
/// budget stops the scan, so a low budget keeps the most relevant entries.
pub fn truncate_to_token_budget(memories: &[ScoredMemory], token_budget: usize) -> Vec<ScoredMemory> {
    let mut kept = Vec::new();
    let mut total = 0;

    for memory in memories {
        let tokens = estimate_tokens(&memory.record.text);
        if total + tokens > token_budget {
            break;
        }
        kept.push(memory.clone());
        total += tokens;
    }

    kept
}
