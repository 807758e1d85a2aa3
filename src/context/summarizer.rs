//! Retention boundaries, transcript serialization and summary generation.

use crate::llm::{ChatOutcome, ChatRequest, LlmProvider, Message};
use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::config::CompactionConfig;
use super::estimator::TokenEstimator;
use super::prompts::{SUMMARY_SYSTEM_PROMPT, build_summary_prompt};

const TRUNCATION_SUFFIX: &str = "...[truncated]";

/// Produces compaction summaries with the session's own LLM provider.
///
/// Boundary selection and serialization are pure; [`Self::summarize`] is the
/// only operation that talks to the network.
pub struct ContextSummarizer<P: LlmProvider> {
    provider: Arc<P>,
    tool_result_char_limit: usize,
    max_tokens: u32,
}

impl<P: LlmProvider> ContextSummarizer<P> {
    #[must_use]
    pub const fn new(provider: Arc<P>, config: &CompactionConfig) -> Self {
        Self {
            provider,
            tool_result_char_limit: config.tool_result_char_limit,
            max_tokens: config.summary_max_tokens,
        }
    }

    /// Index splitting `messages` into a summarizable prefix and a kept suffix.
    ///
    /// `messages[..boundary]` is summarized and `messages[boundary..]` is kept
    /// verbatim. Zero means nothing can be compacted safely yet.
    #[must_use]
    pub fn calculate_retention_boundary(
        messages: &[Message],
        keep_recent_token_budget: usize,
    ) -> usize {
        calculate_retention_boundary(messages, keep_recent_token_budget)
    }

    /// Render messages as flat text for the summarizer's input.
    #[must_use]
    pub fn serialize_messages(&self, messages: &[Message]) -> String {
        serialize_messages(messages, self.tool_result_char_limit)
    }

    /// Generate a summary of `serialized` text, merging `previous_summary` if given.
    ///
    /// # Errors
    /// Returns an error if the input is empty, the call fails or is cancelled,
    /// or the model returns no text.
    pub async fn summarize(
        &self,
        serialized: &str,
        previous_summary: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if serialized.trim().is_empty() {
            bail!("Cannot summarize an empty transcript");
        }

        let request = ChatRequest {
            system: SUMMARY_SYSTEM_PROMPT.to_string(),
            messages: vec![Message::user(build_summary_prompt(
                serialized,
                previous_summary,
            ))],
            tools: None,
            max_tokens: self.max_tokens,
        };

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => bail!("Summarization cancelled"),
            result = self.provider.chat(request) => {
                result.context("Failed to call LLM for summarization")?
            }
        };

        match outcome {
            ChatOutcome::Success(response) => {
                let summary = response.text();
                let summary = summary.trim();
                if summary.is_empty() {
                    bail!("Summary model returned an empty summary");
                }
                Ok(summary.to_string())
            }
            ChatOutcome::RateLimited => {
                bail!("Rate limited during summarization")
            }
            ChatOutcome::InvalidRequest(msg) => {
                bail!("Invalid request during summarization: {msg}")
            }
            ChatOutcome::ServerError(msg) => {
                bail!("Server error during summarization: {msg}")
            }
        }
    }
}

/// See [`ContextSummarizer::calculate_retention_boundary`].
#[must_use]
pub fn calculate_retention_boundary(messages: &[Message], keep_recent_token_budget: usize) -> usize {
    let Some(threshold) = threshold_index(messages, keep_recent_token_budget) else {
        return 0;
    };

    let open_calls = open_tool_calls_by_boundary(messages);

    // Only ever move earlier: the kept suffix grows, never shrinks.
    (1..=threshold)
        .rev()
        .find(|&boundary| is_valid_cut(messages, boundary, &open_calls))
        .unwrap_or(0)
}

/// Newest index at which the kept suffix reaches the budget.
fn threshold_index(messages: &[Message], keep_recent_token_budget: usize) -> Option<usize> {
    let mut accumulated = 0;
    for (index, message) in messages.iter().enumerate().rev() {
        accumulated += TokenEstimator::estimate_message(message);
        if accumulated >= keep_recent_token_budget {
            return Some(index);
        }
    }
    None
}

/// `result[b]` is the number of tool calls in `messages[..b]` still waiting
/// for their result.
///
/// Results must arrive before the next user message, so a user message
/// abandons whatever is still open.
fn open_tool_calls_by_boundary(messages: &[Message]) -> Vec<usize> {
    let mut pending: HashSet<&str> = HashSet::new();
    let mut counts = Vec::with_capacity(messages.len() + 1);
    counts.push(0);

    for message in messages {
        match message {
            Message::Assistant { .. } => {
                pending.extend(message.tool_calls().map(|(id, _, _)| id));
            }
            Message::ToolResult { tool_call_id, .. } => {
                pending.remove(tool_call_id.as_str());
            }
            Message::User { .. } => pending.clear(),
        }
        counts.push(pending.len());
    }

    counts
}

fn is_valid_cut(messages: &[Message], boundary: usize, open_calls: &[usize]) -> bool {
    if boundary == 0 || boundary > messages.len() || open_calls[boundary] != 0 {
        return false;
    }

    let closes_turn = match &messages[boundary - 1] {
        Message::User { .. } => true,
        Message::Assistant { stop_reason, .. } => stop_reason.is_some(),
        Message::ToolResult { .. } => false,
    };

    closes_turn
        && messages
            .get(boundary)
            .is_none_or(|next| !next.is_tool_result())
}

/// See [`ContextSummarizer::serialize_messages`].
#[must_use]
pub fn serialize_messages(messages: &[Message], tool_result_char_limit: usize) -> String {
    let mut output = String::new();

    for message in messages {
        match message {
            Message::User { .. } => {
                let text = message.text();
                let text = text.trim();
                if !text.is_empty() {
                    let _ = writeln!(output, "[User]: {text}");
                }
            }
            Message::Assistant { .. } => {
                let text = message.text();
                let text = text.trim();
                if !text.is_empty() {
                    let _ = writeln!(output, "[Assistant]: {text}");
                }
                for (_, name, arguments) in message.tool_calls() {
                    let _ = writeln!(
                        output,
                        "[Tool Call]: {name}({})",
                        format_arguments(arguments)
                    );
                }
            }
            Message::ToolResult {
                content, is_error, ..
            } => {
                let content = content.trim();
                if content.is_empty() {
                    continue;
                }
                let label = if *is_error { "Tool Error" } else { "Tool Result" };
                let _ = writeln!(
                    output,
                    "[{label}]: {}",
                    truncate_chars(content, tool_result_char_limit)
                );
            }
        }
    }

    // Drop the final newline
    output.truncate(output.trim_end().len());
    output
}

/// Compact JSON with sorted object keys.
fn format_arguments(arguments: &Value) -> String {
    match arguments {
        Value::Null => "{}".to_string(),
        other => other.to_string(),
    }
}

/// Unicode-safe truncation; avoids slicing mid-codepoint.
fn truncate_chars(content: &str, limit: usize) -> String {
    match content.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{TRUNCATION_SUFFIX}", &content[..cut]),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ContentBlock;
    use crate::test_utils::MockProvider;
    use proptest::prelude::*;
    use serde_json::json;

    fn summarizer(provider: MockProvider) -> ContextSummarizer<MockProvider> {
        ContextSummarizer::new(Arc::new(provider), &CompactionConfig::default())
    }

    fn unfinished_tool_call(id: &str) -> Message {
        Message::Assistant {
            content: vec![ContentBlock::ToolCall {
                id: id.to_string(),
                name: "bash".to_string(),
                arguments: json!({"command": "cargo test"}),
            }],
            stop_reason: None,
            usage: None,
        }
    }

    fn kept_tokens(messages: &[Message], boundary: usize) -> usize {
        TokenEstimator::estimate_history(&messages[boundary..])
    }

    #[test]
    fn test_empty_transcript_has_no_boundary() {
        assert_eq!(calculate_retention_boundary(&[], 100), 0);
    }

    #[test]
    fn test_transcript_below_budget_keeps_everything() {
        let messages = vec![Message::user("hello"), Message::assistant("hi")];
        assert_eq!(calculate_retention_boundary(&messages, 10_000), 0);
    }

    #[test]
    fn test_boundary_on_alternating_text() {
        let messages: Vec<Message> = (0..10)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user("u".repeat(396)) // 99 + 4 = 103 tokens
                } else {
                    Message::assistant("a".repeat(396))
                }
            })
            .collect();

        // Three messages reach 309 >= 300, so the raw index is 7.
        let boundary = calculate_retention_boundary(&messages, 300);
        assert_eq!(boundary, 7);
        assert!(kept_tokens(&messages, boundary) >= 300);
    }

    #[test]
    fn test_boundary_never_splits_tool_call_from_result() {
        let messages = vec![
            Message::user("u".repeat(400)),
            Message::assistant("a".repeat(400)),
            Message::user("run the tests"),
            Message::assistant_with_tool_call(None, "tc-1", "bash", json!({"command": "ls"})),
            Message::tool_result("tc-1", "bash", "x".repeat(400), false),
            Message::assistant("done"),
        ];

        // The raw index lands on the tool result (index 4); cutting there
        // would separate it from its call, so the cut moves before the call.
        let boundary = calculate_retention_boundary(&messages, 110);
        assert_eq!(boundary, 3);
        assert!(matches!(messages[boundary - 1], Message::User { .. }));
    }

    #[test]
    fn test_single_unfinished_tool_call_chain_yields_zero() {
        let messages = vec![Message::user("list files"), unfinished_tool_call("tc-1")];

        // 7 + 32 tokens; the budget is only reached at the first message.
        assert_eq!(calculate_retention_boundary(&messages, 35), 0);
    }

    #[test]
    fn test_assistant_without_stop_reason_is_not_a_cut_point() {
        let messages = vec![
            Message::user("u".repeat(40)),
            Message::Assistant {
                content: vec![ContentBlock::Text {
                    text: "streaming".to_string(),
                }],
                stop_reason: None,
                usage: None,
            },
            Message::user("u".repeat(400)),
        ];

        // Raw index 2; a cut after the streaming assistant is illegal, so snap to 1.
        assert_eq!(calculate_retention_boundary(&messages, 50), 1);
    }

    #[test]
    fn test_serialize_messages_format() {
        let s = summarizer(MockProvider::new(vec![]));
        let messages = vec![
            Message::user("Fix the build"),
            Message::assistant_with_tool_call(
                Some("Checking".to_string()),
                "tc-1",
                "bash",
                json!({"command": "cargo build", "cwd": "/repo"}),
            ),
            Message::tool_result("tc-1", "bash", "error[E0308]", true),
            Message::assistant("Fixed the mismatched type."),
        ];

        let serialized = s.serialize_messages(&messages);
        let lines: Vec<&str> = serialized.lines().collect();

        assert_eq!(
            lines,
            vec![
                "[User]: Fix the build",
                "[Assistant]: Checking",
                r#"[Tool Call]: bash({"command":"cargo build","cwd":"/repo"})"#,
                "[Tool Error]: error[E0308]",
                "[Assistant]: Fixed the mismatched type.",
            ]
        );
    }

    #[test]
    fn test_serialize_truncates_tool_results_unicode_safely() {
        let messages = vec![Message::tool_result("tc-1", "read", "é".repeat(600), false)];

        let serialized = serialize_messages(&messages, 500);

        assert!(serialized.ends_with("...[truncated]"));
        assert_eq!(serialized.matches('é').count(), 500);
    }

    #[test]
    fn test_serialize_skips_empty_messages() {
        let messages = vec![Message::user("   "), Message::tool_result("tc-1", "bash", "", false)];
        assert!(serialize_messages(&messages, 500).is_empty());
    }

    #[tokio::test]
    async fn test_summarize_returns_trimmed_text() -> Result<()> {
        let provider = MockProvider::new(vec![MockProvider::text_response("  ## Goal\nShip  \n")]);
        let s = summarizer(provider);

        let summary = s
            .summarize("[User]: ship it", None, &CancellationToken::new())
            .await?;

        assert_eq!(summary, "## Goal\nShip");
        Ok(())
    }

    #[tokio::test]
    async fn test_summarize_uses_update_prompt_with_previous_summary() -> Result<()> {
        let provider = Arc::new(MockProvider::new(vec![MockProvider::text_response("merged")]));
        let s = ContextSummarizer::new(Arc::clone(&provider), &CompactionConfig::default());

        s.summarize("[User]: more", Some("old summary"), &CancellationToken::new())
            .await?;

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let prompt = requests[0].messages[0].text();
        assert!(prompt.contains("Previous summary:\nold summary"));
        assert!(prompt.contains("New transcript:\n[User]: more"));
        Ok(())
    }

    #[tokio::test]
    async fn test_summarize_rejects_empty_input_without_calling_llm() {
        let provider = Arc::new(MockProvider::new(vec![]));
        let s = ContextSummarizer::new(Arc::clone(&provider), &CompactionConfig::default());

        let result = s.summarize("  \n", None, &CancellationToken::new()).await;

        assert!(result.is_err());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_summarize_rejects_empty_model_output() {
        let s = summarizer(MockProvider::new(vec![MockProvider::text_response("   ")]));

        let result = s
            .summarize("[User]: hi", None, &CancellationToken::new())
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_summarize_maps_non_success_outcomes_to_errors() {
        let s = summarizer(MockProvider::new(vec![ChatOutcome::ServerError(
            "boom".to_string(),
        )]));

        let error = s
            .summarize("[User]: hi", None, &CancellationToken::new())
            .await
            .err()
            .map(|e| e.to_string());

        assert_eq!(
            error.as_deref(),
            Some("Server error during summarization: boom")
        );
    }

    #[tokio::test]
    async fn test_summarize_honours_cancellation() {
        let s = summarizer(MockProvider::new(vec![MockProvider::text_response("late")]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = s.summarize("[User]: hi", None, &cancel).await;

        assert!(result.is_err_and(|e| e.to_string().contains("cancelled")));
    }

    // Generated transcripts are built from whole user turns so that every
    // tool call is answered, except optionally in a trailing unfinished turn.
    #[derive(Debug, Clone)]
    struct TurnShape {
        user_chars: usize,
        tool_steps: Vec<usize>,
        reply_chars: usize,
    }

    fn turn_shape() -> impl Strategy<Value = TurnShape> {
        (
            1usize..400,
            proptest::collection::vec(1usize..600, 0..3),
            1usize..400,
        )
            .prop_map(|(user_chars, tool_steps, reply_chars)| TurnShape {
                user_chars,
                tool_steps,
                reply_chars,
            })
    }

    fn build_transcript(turns: &[TurnShape], unfinished_tail: bool) -> Vec<Message> {
        let mut messages = Vec::new();
        let mut next_id = 0;
        for turn in turns {
            messages.push(Message::user("u".repeat(turn.user_chars)));
            for output_chars in &turn.tool_steps {
                let id = format!("tc-{next_id}");
                next_id += 1;
                messages.push(Message::assistant_with_tool_call(
                    None,
                    id.clone(),
                    "bash",
                    json!({"step": next_id}),
                ));
                messages.push(Message::tool_result(id, "bash", "o".repeat(*output_chars), false));
            }
            messages.push(Message::assistant("a".repeat(turn.reply_chars)));
        }
        if unfinished_tail {
            messages.push(Message::user("one more thing"));
            messages.push(unfinished_tool_call("tc-open"));
        }
        messages
    }

    proptest! {
        #[test]
        fn prop_boundary_is_structurally_safe_and_keeps_budget(
            turns in proptest::collection::vec(turn_shape(), 0..8),
            unfinished_tail in any::<bool>(),
            budget in 0usize..1_500,
        ) {
            let messages = build_transcript(&turns, unfinished_tail);
            let boundary = calculate_retention_boundary(&messages, budget);
            let total = TokenEstimator::estimate_history(&messages);

            prop_assert!(boundary <= messages.len());
            prop_assert!(kept_tokens(&messages, boundary) >= budget.min(total));

            if boundary > 0 {
                let prefix = &messages[..boundary];
                let called: HashSet<&str> = prefix
                    .iter()
                    .flat_map(|m| m.tool_calls().map(|(id, _, _)| id))
                    .collect();
                let answered: HashSet<&str> = prefix
                    .iter()
                    .filter_map(|m| match m {
                        Message::ToolResult { tool_call_id, .. } => Some(tool_call_id.as_str()),
                        _ => None,
                    })
                    .collect();
                prop_assert_eq!(&called, &answered);
                prop_assert!(!messages[boundary].is_tool_result());
                let closes_turn = matches!(
                    &messages[boundary - 1],
                    Message::User { .. }
                        | Message::Assistant { stop_reason: Some(_), .. }
                );
                prop_assert!(closes_turn);
            }
        }
    }

    #[test]
    fn test_open_tool_call_blocks_cut_after_completed_assistant() {
        let messages = vec![
            Message::user("u".repeat(40)),
            Message::assistant_with_tool_call(None, "tc-1", "bash", json!({})),
            Message::user("interrupted"),
        ];

        // The assistant has a stop reason but its call never got a result.
        assert_eq!(calculate_retention_boundary(&messages, 1), 1);
    }

    #[test]
    fn test_abandoned_tool_call_does_not_block_later_cuts() {
        let mut messages = vec![
            Message::user("start"),
            Message::assistant_with_tool_call(None, "tc-lost", "bash", json!({})),
            Message::user("interrupted"),
        ];
        // 100 tokens each
        messages.extend(crate::test_utils::text_transcript(60, 384));

        let boundary = calculate_retention_boundary(&messages, 300);

        assert_eq!(messages.len(), 63);
        assert_eq!(boundary, 60);
        // The abandoned call is in the summarized prefix
        assert!(messages[..boundary].iter().any(|m| m.tool_calls().any(|(id, _, _)| id == "tc-lost")));
    }
}
