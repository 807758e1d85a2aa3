//! Token estimation for context size calculation.

use crate::llm::{ContentBlock, Message};

/// Estimates token count for messages.
///
/// Uses a simple heuristic of ~4 characters per token, which provides
/// a reasonable approximation for most English text and code. The
/// estimate is pure and total: every input has a cost, none fails.
pub struct TokenEstimator;

impl TokenEstimator {
    /// Characters per token estimate.
    pub const CHARS_PER_TOKEN: usize = 4;

    /// Overhead tokens per message (role, formatting).
    const MESSAGE_OVERHEAD: usize = 4;

    /// Overhead for tool call blocks (id, name, formatting).
    const TOOL_CALL_OVERHEAD: usize = 20;

    /// Overhead for tool result messages (id, formatting).
    const TOOL_RESULT_OVERHEAD: usize = 10;

    /// Estimate tokens for a text string.
    #[must_use]
    pub const fn estimate_text(text: &str) -> usize {
        text.len().div_ceil(Self::CHARS_PER_TOKEN)
    }

    /// Estimate tokens for a single message.
    #[must_use]
    pub fn estimate_message(message: &Message) -> usize {
        let content_tokens = match message {
            Message::User { content } | Message::Assistant { content, .. } => {
                content.iter().map(Self::estimate_block).sum()
            }
            Message::ToolResult {
                tool_name, content, ..
            } => {
                Self::estimate_text(tool_name)
                    + Self::estimate_text(content)
                    + Self::TOOL_RESULT_OVERHEAD
            }
        };

        content_tokens + Self::MESSAGE_OVERHEAD
    }

    /// Estimate tokens for a content block.
    #[must_use]
    pub fn estimate_block(block: &ContentBlock) -> usize {
        match block {
            ContentBlock::Text { text } => Self::estimate_text(text),
            ContentBlock::Thinking { thinking } => Self::estimate_text(thinking),
            ContentBlock::ToolCall {
                id,
                name,
                arguments,
            } => {
                let arguments_str = arguments.to_string();
                Self::estimate_text(id)
                    + Self::estimate_text(name)
                    + Self::estimate_text(&arguments_str)
                    + Self::TOOL_CALL_OVERHEAD
            }
        }
    }

    /// Estimate total tokens for a message history.
    #[must_use]
    pub fn estimate_history(messages: &[Message]) -> usize {
        messages.iter().map(Self::estimate_message).sum()
    }
}
