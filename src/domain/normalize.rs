//! Response normalization for completion-shaped provider replies.
//!
//! Two independent responsibilities:
//! 1. a lenient fallback JSON walk for when a provider's strict schema
//!    decode yields no text (upstream APIs mutate response shape without
//!    version bumps), and
//! 2. cleanup of backend "thinking" scratchpad annotations before text is
//!    returned to the caller.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::domain::DomainError;

static ANGLE_THINK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<think(?:ing)?>.*?</think(?:ing)?>").unwrap());

static BRACKET_THINK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\[thinking\].*?\[/thinking\]").unwrap());

static ASTERISK_THINK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\*thinking\*.*?\*/thinking\*").unwrap());

static EXCESS_NEWLINES_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Strip thinking-tag spans from a model response.
///
/// Handles `<think>`, `<thinking>`, `[thinking]` and `*thinking*` blocks,
/// case-insensitively, non-greedy, across newlines. Idempotent.
pub fn clean_thinking_tags(text: &str) -> String {
    let text = ANGLE_THINK_REGEX.replace_all(text, "");
    let text = BRACKET_THINK_REGEX.replace_all(&text, "");
    let text = ASTERISK_THINK_REGEX.replace_all(&text, "");
    text.into_owned()
}

/// Full cleanup applied to every successful `enhance`/`analyze_image` result:
/// strip thinking tags, collapse 3+ consecutive newlines to exactly 2, trim.
pub fn clean_response(text: &str) -> String {
    let cleaned = clean_thinking_tags(text);
    let collapsed = EXCESS_NEWLINES_REGEX.replace_all(&cleaned, "\n\n");
    collapsed.trim().to_string()
}

/// Lenient JSON tree walk for completion responses whose strict decode came
/// up empty. Checks, in order:
/// (a) first candidate's `content.parts[0].text`,
/// (b) `content.text`,
/// (c) the legacy top-level `output` field.
pub fn fallback_extract(value: &Value) -> Option<String> {
    let candidate_text = value
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.get(0))
        .and_then(|p| p.get("text"))
        .and_then(Value::as_str);
    if let Some(text) = candidate_text {
        if !text.is_empty() {
            return Some(text.to_string());
        }
    }

    let content_text = value
        .get("content")
        .and_then(|c| c.get("text"))
        .and_then(Value::as_str);
    if let Some(text) = content_text {
        if !text.is_empty() {
            return Some(text.to_string());
        }
    }

    let output = value.get("output").and_then(Value::as_str);
    if let Some(text) = output {
        if !text.is_empty() {
            return Some(text.to_string());
        }
    }

    None
}

/// Resolve a completion body: prefer the adapter's strict decode, fall back
/// to the lenient walk over the raw body, and clean the survivor.
///
/// A response that fails both tiers is `EmptyResponse`, not a parse error.
pub fn resolve_completion(strict: Option<String>, raw_body: &str) -> Result<String, DomainError> {
    let text = match strict.filter(|t| !t.trim().is_empty()) {
        Some(text) => text,
        None => serde_json::from_str::<Value>(raw_body)
            .ok()
            .as_ref()
            .and_then(fallback_extract)
            .ok_or(DomainError::EmptyResponse)?,
    };

    let cleaned = clean_response(&text);
    if cleaned.is_empty() {
        return Err(DomainError::EmptyResponse);
    }
    Ok(cleaned)
}
