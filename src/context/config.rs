//! Configuration for context compaction.

use serde::{Deserialize, Serialize};

/// Configuration for context compaction.
///
/// Controls when compaction triggers and how much of the transcript is kept
/// verbatim. Missing fields in a serialized config fall back to the defaults,
/// so hosts can embed a partial document in their own settings file.
///
/// # Example
///
/// ```
/// use agent_compaction::context::CompactionConfig;
///
/// let config = CompactionConfig::default()
///     .with_max_tokens(128_000)
///     .with_keep_recent_tokens(10_000);
/// assert_eq!(config.threshold_tokens(), 128_000 - 16_384 - 10_000);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    /// Context window of the active model, in tokens.
    /// Default: 200,000
    pub max_tokens: usize,

    /// Tokens held back for the model's reply and request overhead.
    /// Default: 16,384
    pub reserve_tokens: usize,

    /// Token budget of the most recent messages kept verbatim.
    /// Default: 20,000
    pub keep_recent_tokens: usize,

    /// Whether to compact automatically when the threshold is crossed.
    /// If false, compaction only occurs when forced.
    /// Default: true
    pub auto_compact: bool,

    /// Character cap for each tool result in the summarizer's input.
    /// Default: 500
    pub tool_result_char_limit: usize,

    /// Response token limit for the summarization call.
    /// Default: 4,096
    pub summary_max_tokens: u32,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            max_tokens: 200_000,
            reserve_tokens: 16_384,
            keep_recent_tokens: 20_000,
            auto_compact: true,
            tool_result_char_limit: 500,
            summary_max_tokens: 4_096,
        }
    }
}

impl CompactionConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimated transcript size above which automatic compaction runs.
    #[must_use]
    pub const fn threshold_tokens(&self) -> usize {
        self.max_tokens
            .saturating_sub(self.reserve_tokens)
            .saturating_sub(self.keep_recent_tokens)
    }

    /// Set the model context window.
    #[must_use]
    pub const fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = tokens;
        self
    }

    /// Set the reserved response budget.
    #[must_use]
    pub const fn with_reserve_tokens(mut self, tokens: usize) -> Self {
        self.reserve_tokens = tokens;
        self
    }

    /// Set the verbatim-kept recent budget.
    #[must_use]
    pub const fn with_keep_recent_tokens(mut self, tokens: usize) -> Self {
        self.keep_recent_tokens = tokens;
        self
    }

    /// Set whether to auto-compact.
    #[must_use]
    pub const fn with_auto_compact(mut self, auto: bool) -> Self {
        self.auto_compact = auto;
        self
    }

    /// Set the per-tool-result character cap used during serialization.
    #[must_use]
    pub const fn with_tool_result_char_limit(mut self, limit: usize) -> Self {
        self.tool_result_char_limit = limit;
        self
    }

    /// Set the summarization response limit.
    #[must_use]
    pub const fn with_summary_max_tokens(mut self, tokens: u32) -> Self {
        self.summary_max_tokens = tokens;
        self
    }
}
