//! Agent events for UI updates and logging.
//!
//! The [`AgentEvent`] enum represents everything the agent loop and the
//! compaction controller report while a turn runs. Events are delivered to
//! [`AgentHooks::on_event`](crate::hooks::AgentHooks::on_event).
//!
//! # Event Flow
//!
//! A typical turn looks like:
//! 1. `Start` - Turn begins
//! 2. `CompactionStarted` / `ContextCompacted` / `Notice` - Only when the
//!    transcript crossed the compaction threshold
//! 3. `Text` / `ToolCallStart` / `ToolCallEnd` - Processing events
//! 4. `TurnComplete` - One LLM round-trip finished
//! 5. `Done` - Turn completed successfully, or `Error` if it failed

use crate::types::{ThreadId, TokenUsage, ToolResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Events emitted during a turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A user turn has started
    Start { thread_id: ThreadId, turn: usize },

    /// Complete text block from the agent
    Text { message_id: String, text: String },

    /// Agent is about to call a tool
    ToolCallStart {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Tool execution completed
    ToolCallEnd {
        id: String,
        name: String,
        result: ToolResult,
    },

    /// A summarization call is about to be made
    CompactionStarted {
        thread_id: ThreadId,
        /// Messages about to be summarized
        message_count: usize,
        /// Estimated transcript tokens before compaction
        tokens_before: usize,
    },

    /// Context was compacted to reduce size
    ContextCompacted {
        thread_id: ThreadId,
        /// Estimated tokens before compaction
        tokens_before: usize,
        /// Estimated tokens after compaction, summary included
        tokens_after: usize,
        /// Messages removed in this compaction
        compacted_messages: usize,
        /// Successful compactions of this session so far
        compaction_count: u32,
    },

    /// Summarization failed and the transcript was left untouched
    CompactionFailed { thread_id: ThreadId, detail: String },

    /// The provider rejected a request as too large
    ContextOverflow { message: String },

    /// A status line meant for the user
    Notice { message: String },

    /// One LLM round-trip completed
    TurnComplete { turn: usize, usage: TokenUsage },

    /// The user turn completed successfully
    Done {
        thread_id: ThreadId,
        total_turns: usize,
        total_usage: TokenUsage,
        duration: Duration,
    },

    /// An error occurred during execution
    Error { message: String, recoverable: bool },
}

impl AgentEvent {
    #[must_use]
    pub const fn start(thread_id: ThreadId, turn: usize) -> Self {
        Self::Start { thread_id, turn }
    }

    #[must_use]
    pub fn text(message_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Text {
            message_id: message_id.into(),
            text: text.into(),
        }
    }

    #[must_use]
    pub fn tool_call_start(
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self::ToolCallStart {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    #[must_use]
    pub fn tool_call_end(id: impl Into<String>, name: impl Into<String>, result: ToolResult) -> Self {
        Self::ToolCallEnd {
            id: id.into(),
            name: name.into(),
            result,
        }
    }

    #[must_use]
    pub const fn compaction_started(
        thread_id: ThreadId,
        message_count: usize,
        tokens_before: usize,
    ) -> Self {
        Self::CompactionStarted {
            thread_id,
            message_count,
            tokens_before,
        }
    }

    #[must_use]
    pub const fn context_compacted(
        thread_id: ThreadId,
        tokens_before: usize,
        tokens_after: usize,
        compacted_messages: usize,
        compaction_count: u32,
    ) -> Self {
        Self::ContextCompacted {
            thread_id,
            tokens_before,
            tokens_after,
            compacted_messages,
            compaction_count,
        }
    }

    #[must_use]
    pub fn compaction_failed(thread_id: ThreadId, detail: impl Into<String>) -> Self {
        Self::CompactionFailed {
            thread_id,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn context_overflow(message: impl Into<String>) -> Self {
        Self::ContextOverflow {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn notice(message: impl Into<String>) -> Self {
        Self::Notice {
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn turn_complete(turn: usize, usage: TokenUsage) -> Self {
        Self::TurnComplete { turn, usage }
    }

    #[must_use]
    pub const fn done(
        thread_id: ThreadId,
        total_turns: usize,
        total_usage: TokenUsage,
        duration: Duration,
    ) -> Self {
        Self::Done {
            thread_id,
            total_turns,
            total_usage,
            duration,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>, recoverable: bool) -> Self {
        Self::Error {
            message: message.into(),
            recoverable,
        }
    }
}
