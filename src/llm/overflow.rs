//! Recognition of context-overflow rejections.
//!
//! Providers do not agree on a typed "input too large" signal, so overflow is
//! detected from the error text they return. All provider knowledge lives in
//! [`OVERFLOW_PATTERNS`]; adding a provider means adding a pattern here.
//!
//! Error bodies are unwrapped from the common JSON envelopes first:
//! - Standard: `{"error": {"message": "...", "type": "..."}}`
//! - Code:     `{"error": {"message": "...", "code": "..."}}`
//! - Detail:   `{"detail": "..."}`
//! - Flat:     `{"message": "...", "code": "..."}`

use serde_json::Value;

use super::{ChatOutcome, StopReason};

/// Lowercase fragments that identify an overflow rejection.
const OVERFLOW_PATTERNS: &[&str] = &[
    "context_length_exceeded",
    "maximum context length",
    "prompt is too long",
    "model_context_window_exceeded",
    "exceeds the context window",
    "input is too long",
];

/// Returns true when `error_text` is a provider rejection for input size.
#[must_use]
pub fn is_context_overflow(error_text: &str) -> bool {
    if error_text.trim().is_empty() {
        return false;
    }

    let haystack = match extract_error_fields(error_text) {
        Some((message, code)) => format!("{message} {}", code.unwrap_or_default()),
        None => error_text.to_string(),
    }
    .to_lowercase();

    OVERFLOW_PATTERNS
        .iter()
        .any(|pattern| haystack.contains(pattern))
}

/// Map a chat outcome to the overflow message it carries, if any.
#[must_use]
pub fn classify_overflow(outcome: &ChatOutcome) -> Option<String> {
    match outcome {
        ChatOutcome::InvalidRequest(msg) | ChatOutcome::ServerError(msg)
            if is_context_overflow(msg) =>
        {
            Some(msg.clone())
        }
        ChatOutcome::Success(response)
            if response.stop_reason == Some(StopReason::ContextWindowExceeded) =>
        {
            Some("model_context_window_exceeded".to_string())
        }
        _ => None,
    }
}

/// Pull `(message, code)` out of a JSON error body.
fn extract_error_fields(body: &str) -> Option<(String, Option<String>)> {
    let json: Value = serde_json::from_str(body.trim()).ok()?;

    if let Some(msg) = json["error"]["message"].as_str() {
        let code = json["error"]["type"]
            .as_str()
            .or_else(|| json["error"]["code"].as_str())
            .map(String::from);
        return Some((msg.to_string(), code));
    }

    let msg = json["detail"].as_str().or_else(|| json["message"].as_str())?;
    let code = json["code"]
        .as_str()
        .or_else(|| json["type"].as_str())
        .map(String::from);
    Some((msg.to_string(), code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, ContentBlock, Usage};

    #[test]
    fn openai_code_in_envelope() {
        let body = r#"{"error":{"message":"Too large","code":"context_length_exceeded"}}"#;
        assert!(is_context_overflow(body));
    }

    #[test]
    fn openai_maximum_context_length_text() {
        assert!(is_context_overflow(
            "This model's Maximum Context Length is 128000 tokens. However, you requested 130000 tokens."
        ));
    }

    #[test]
    fn anthropic_prompt_too_long() {
        let body = r#"{"type":"error","error":{"type":"invalid_request_error","message":"prompt is too long: 210000 tokens > 200000 maximum"}}"#;
        assert!(is_context_overflow(body));
    }

    #[test]
    fn flat_detail_format() {
        assert!(is_context_overflow(
            r#"{"detail":"Input is too long for requested model."}"#
        ));
    }

    #[test]
    fn unrelated_errors_are_not_overflow() {
        assert!(!is_context_overflow(""));
        assert!(!is_context_overflow("   "));
        assert!(!is_context_overflow(
            r#"{"error":{"type":"overloaded_error","message":"Overloaded"}}"#
        ));
        assert!(!is_context_overflow("invalid api key"));
    }

    #[test]
    fn classify_outcomes() {
        let overflow = ChatOutcome::InvalidRequest("context_length_exceeded".to_string());
        assert_eq!(
            classify_overflow(&overflow).as_deref(),
            Some("context_length_exceeded")
        );

        assert!(classify_overflow(&ChatOutcome::RateLimited).is_none());
        assert!(classify_overflow(&ChatOutcome::InvalidRequest("bad tool schema".into())).is_none());

        let stopped = ChatOutcome::Success(ChatResponse {
            id: "msg_1".to_string(),
            content: vec![ContentBlock::Text {
                text: String::new(),
            }],
            model: "mock".to_string(),
            stop_reason: Some(StopReason::ContextWindowExceeded),
            usage: Usage::default(),
        });
        assert!(classify_overflow(&stopped).is_some());
    }
}
