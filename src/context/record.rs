//! The persisted summary state of a compacted session.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use time::OffsetDateTime;

/// Summary of everything removed from the transcript so far.
///
/// A session holds zero or one record. Each successful compaction replaces it
/// wholesale with [`CompactionRecord::next`]; fields are never edited in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionRecord {
    /// Structured summary text injected ahead of the kept transcript.
    pub summary: String,
    /// The summary this record replaced, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_summary: Option<String>,
    /// Total messages folded into the summary across all compactions.
    pub compacted_message_count: usize,
    /// Estimated transcript tokens before the latest compaction.
    pub tokens_before: usize,
    /// Estimated tokens of the kept suffix plus the summary.
    pub tokens_after: usize,
    /// Successful compactions so far.
    pub compaction_count: NonZeroU32,
    #[serde(with = "time::serde::rfc3339")]
    pub last_compacted_at: OffsetDateTime,
}

impl CompactionRecord {
    /// Record for a session's first compaction.
    #[must_use]
    pub fn first(
        summary: String,
        compacted_messages: usize,
        tokens_before: usize,
        tokens_after: usize,
    ) -> Self {
        Self {
            summary,
            previous_summary: None,
            compacted_message_count: compacted_messages,
            tokens_before,
            tokens_after,
            compaction_count: NonZeroU32::MIN,
            last_compacted_at: OffsetDateTime::now_utc(),
        }
    }

    /// Record that supersedes `self` after another compaction.
    #[must_use]
    pub fn next(
        &self,
        summary: String,
        compacted_messages: usize,
        tokens_before: usize,
        tokens_after: usize,
    ) -> Self {
        Self {
            summary,
            previous_summary: Some(self.summary.clone()),
            compacted_message_count: self
                .compacted_message_count
                .saturating_add(compacted_messages),
            tokens_before,
            tokens_after,
            compaction_count: self.compaction_count.saturating_add(1),
            last_compacted_at: OffsetDateTime::now_utc(),
        }
    }

    /// Build the record following `previous`, or the first one.
    #[must_use]
    pub fn succeed(
        previous: Option<&Self>,
        summary: String,
        compacted_messages: usize,
        tokens_before: usize,
        tokens_after: usize,
    ) -> Self {
        match previous {
            Some(record) => record.next(summary, compacted_messages, tokens_before, tokens_after),
            None => Self::first(summary, compacted_messages, tokens_before, tokens_after),
        }
    }
}
