//! Results of a compaction attempt and the notices they produce.

use serde::{Deserialize, Serialize};

/// Result of one controller call. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompactionOutcome {
    /// A prefix was summarized and removed.
    Compacted {
        tokens_before: usize,
        tokens_after: usize,
        compacted_messages: usize,
    },
    /// The transcript is under the threshold, or threshold triggering is off.
    SkippedBelowThreshold,
    /// This turn already compacted or attempted to.
    SkippedAlreadyCompacted,
    /// No structurally safe cut point exists yet.
    SkippedNoValidBoundary,
    /// Summarization failed; the transcript is untouched.
    Failed { detail: String },
}

/// What asked for a compaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionTrigger {
    /// Once per user turn, before the first model request.
    PreRequest,
    /// Before every model request inside a turn.
    ContextTransform,
    /// After the provider rejected a request as too large.
    OverflowRetry,
    /// The `/compact` command.
    Manual,
}

impl CompactionOutcome {
    #[must_use]
    pub const fn is_compacted(&self) -> bool {
        matches!(self, Self::Compacted { .. })
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Status line for this outcome under `trigger`, if one should be shown.
    ///
    /// Automatic triggers only report successful compactions; failures and
    /// skips stay silent. Manual compaction always reports.
    #[must_use]
    pub fn notice(&self, trigger: CompactionTrigger) -> Option<String> {
        match trigger {
            CompactionTrigger::Manual => Some(self.manual_notice()),
            _ => match self {
                Self::Compacted { .. } => Some(self.manual_notice()),
                _ => None,
            },
        }
    }

    /// Explicit status line shown to a user who asked for compaction.
    #[must_use]
    pub fn manual_notice(&self) -> String {
        match self {
            Self::Compacted {
                tokens_before,
                tokens_after,
                compacted_messages,
            } => format!(
                "Compacted {} → {} tokens ({compacted_messages} messages summarized)",
                format_thousands(*tokens_before),
                format_thousands(*tokens_after),
            ),
            Self::SkippedBelowThreshold
            | Self::SkippedAlreadyCompacted
            | Self::SkippedNoValidBoundary => "Nothing eligible to compact yet.".to_string(),
            Self::Failed { detail } => format!("Compaction failed: {detail}"),
        }
    }
}

fn format_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
