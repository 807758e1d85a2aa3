//! Compaction policy and orchestration for one session.

use crate::events::AgentEvent;
use crate::hooks::{AgentHooks, DefaultHooks};
use crate::llm::{ContentBlock, LlmProvider, Message};
use crate::stores::TranscriptStore;
use crate::types::ThreadId;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

use super::config::CompactionConfig;
use super::estimator::TokenEstimator;
use super::outcome::CompactionOutcome;
use super::prompts::{COMPACTION_ACK_TEXT, COMPACTION_SUMMARY_HEADER};
use super::record::CompactionRecord;
use super::summarizer::ContextSummarizer;

/// Single entry point for threshold checks and forced compaction.
///
/// One controller exists per session and is passed explicitly to every
/// trigger site. It owns the "already compacted this turn" flag; the host
/// resets it with [`Self::begin_turn`] at the start of each user turn.
///
/// The controller never returns an error. Anything that goes wrong while
/// compacting becomes [`CompactionOutcome::Failed`] with the transcript and
/// record left exactly as they were.
pub struct CompactionController<P: LlmProvider, S: TranscriptStore> {
    thread_id: ThreadId,
    store: Arc<S>,
    summarizer: ContextSummarizer<P>,
    config: CompactionConfig,
    compacted_this_turn: AtomicBool,
    hooks: Arc<dyn AgentHooks>,
}

impl<P: LlmProvider, S: TranscriptStore> CompactionController<P, S> {
    #[must_use]
    pub fn new(thread_id: ThreadId, provider: Arc<P>, store: Arc<S>, config: CompactionConfig) -> Self {
        let summarizer = ContextSummarizer::new(provider, &config);
        Self {
            thread_id,
            store,
            summarizer,
            config,
            compacted_this_turn: AtomicBool::new(false),
            hooks: Arc::new(DefaultHooks),
        }
    }

    /// Receive `CompactionStarted`/`ContextCompacted`/`CompactionFailed` events.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn AgentHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub const fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    #[must_use]
    pub const fn config(&self) -> &CompactionConfig {
        &self.config
    }

    /// Reset the per-turn idempotency flag.
    pub fn begin_turn(&self) {
        self.compacted_this_turn.store(false, Ordering::SeqCst);
    }

    /// Whether a summarization was attempted during the current turn.
    #[must_use]
    pub fn has_compacted_this_turn(&self) -> bool {
        self.compacted_this_turn.load(Ordering::SeqCst)
    }

    /// True iff the estimated transcript size exceeds
    /// `max_tokens - reserve_tokens - keep_recent_tokens` (floored at zero).
    #[must_use]
    pub fn should_compact(
        messages: &[Message],
        max_tokens: usize,
        reserve_tokens: usize,
        keep_recent_tokens: usize,
    ) -> bool {
        let threshold = max_tokens
            .saturating_sub(reserve_tokens)
            .saturating_sub(keep_recent_tokens);
        TokenEstimator::estimate_history(messages) > threshold
    }

    /// Automatic-compaction policy under this controller's configuration.
    #[must_use]
    pub fn needs_compaction(&self, messages: &[Message]) -> bool {
        self.config.auto_compact
            && Self::should_compact(
                messages,
                self.config.max_tokens,
                self.config.reserve_tokens,
                self.config.keep_recent_tokens,
            )
    }

    /// Compact the session if policy allows it.
    ///
    /// Unless `force` is set, nothing happens when the turn already compacted,
    /// when `allow_threshold` is false, or when the transcript is under the
    /// threshold. A forced call skips all three checks.
    pub async fn check_and_compact(
        &self,
        force: bool,
        allow_threshold: bool,
        cancel: &CancellationToken,
    ) -> CompactionOutcome {
        match self.compact(force, allow_threshold, cancel).await {
            Ok(outcome) => outcome,
            Err(error) => {
                let detail = format!("{error:#}");
                warn!(
                    "Compaction failed (thread_id={}, error={detail})",
                    self.thread_id
                );
                self.hooks
                    .on_event(&AgentEvent::compaction_failed(
                        self.thread_id.clone(),
                        detail.clone(),
                    ))
                    .await;
                CompactionOutcome::Failed { detail }
            }
        }
    }

    /// Compact immediately, bypassing the threshold and the per-turn flag.
    pub async fn force_compact(&self, cancel: &CancellationToken) -> CompactionOutcome {
        self.check_and_compact(true, true, cancel).await
    }

    /// The transcript as the model should see it, summary included.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub async fn model_context(&self) -> Result<Vec<Message>> {
        let messages = self
            .store
            .get_messages(&self.thread_id)
            .await
            .context("Failed to load transcript")?;
        let record = self
            .store
            .compaction_record(&self.thread_id)
            .await
            .context("Failed to load compaction record")?;
        Ok(inject_summary(record.as_ref(), messages))
    }

    async fn compact(
        &self,
        force: bool,
        allow_threshold: bool,
        cancel: &CancellationToken,
    ) -> Result<CompactionOutcome> {
        if !force {
            if self.has_compacted_this_turn() {
                debug!(
                    "Compaction skipped: already compacted this turn (thread_id={})",
                    self.thread_id
                );
                return Ok(CompactionOutcome::SkippedAlreadyCompacted);
            }
            if !allow_threshold {
                return Ok(CompactionOutcome::SkippedBelowThreshold);
            }
        }

        let messages = self
            .store
            .get_messages(&self.thread_id)
            .await
            .context("Failed to load transcript")?;

        if !force && !self.needs_compaction(&messages) {
            return Ok(CompactionOutcome::SkippedBelowThreshold);
        }

        let boundary =
            ContextSummarizer::<P>::calculate_retention_boundary(&messages, self.config.keep_recent_tokens);
        if boundary == 0 {
            debug!(
                "Compaction skipped: no valid retention boundary (thread_id={}, messages={})",
                self.thread_id,
                messages.len()
            );
            return Ok(CompactionOutcome::SkippedNoValidBoundary);
        }

        let previous = self
            .store
            .compaction_record(&self.thread_id)
            .await
            .context("Failed to load compaction record")?;

        let (prefix, retained) = messages.split_at(boundary);
        let tokens_before = TokenEstimator::estimate_history(&messages);

        // From here on the attempt counts for this turn, even if it fails.
        self.compacted_this_turn.store(true, Ordering::SeqCst);
        self.hooks
            .on_event(&AgentEvent::compaction_started(
                self.thread_id.clone(),
                prefix.len(),
                tokens_before,
            ))
            .await;

        let serialized = self.summarizer.serialize_messages(prefix);
        let summary = self
            .summarizer
            .summarize(
                &serialized,
                previous.as_ref().map(|r| r.summary.as_str()),
                cancel,
            )
            .await?;

        let tokens_after =
            TokenEstimator::estimate_history(retained) + TokenEstimator::estimate_text(&summary);
        let record = CompactionRecord::succeed(
            previous.as_ref(),
            summary,
            prefix.len(),
            tokens_before,
            tokens_after,
        );
        let compaction_count = record.compaction_count.get();

        self.store
            .replace_prefix(&self.thread_id, retained.to_vec(), record)
            .await
            .context("Failed to store compacted transcript")?;

        info!(
            "Context compacted (thread_id={}, tokens_before={tokens_before}, tokens_after={tokens_after}, compacted_messages={}, compaction_count={compaction_count})",
            self.thread_id,
            prefix.len()
        );
        self.hooks
            .on_event(&AgentEvent::context_compacted(
                self.thread_id.clone(),
                tokens_before,
                tokens_after,
                prefix.len(),
                compaction_count,
            ))
            .await;

        Ok(CompactionOutcome::Compacted {
            tokens_before,
            tokens_after,
            compacted_messages: prefix.len(),
        })
    }
}

/// Prepend the summary of `record` to `messages` for a model request.
///
/// The stored transcript is never modified; this is a read-time view. When
/// the kept messages already start with a user message an assistant
/// acknowledgement follows the summary so roles keep alternating.
#[must_use]
pub fn inject_summary(record: Option<&CompactionRecord>, messages: Vec<Message>) -> Vec<Message> {
    let Some(summary) = record.map(|r| r.summary.trim()).filter(|s| !s.is_empty()) else {
        return messages;
    };

    let summary_message = Message::user(format!("{COMPACTION_SUMMARY_HEADER}\n\n{summary}"));
    // Only this record's own summary counts as already injected.
    if messages.first() == Some(&summary_message) {
        return messages;
    }

    let starts_with_user = matches!(messages.first(), Some(Message::User { .. }));
    let mut context = Vec::with_capacity(messages.len() + 2);
    context.push(summary_message);
    if starts_with_user {
        context.push(Message::assistant(COMPACTION_ACK_TEXT));
    }
    context.extend(messages);
    context
}

/// Whether `message` looks like a synthetic summary built by [`inject_summary`].
///
/// Matches on the header only, so it also accepts user text that happens to
/// start with it. Use it to filter model context for display, not to decide
/// injection.
#[must_use]
pub fn is_summary_message(message: &Message) -> bool {
    match message {
        Message::User { content } => matches!(
            content.first(),
            Some(ContentBlock::Text { text }) if text.starts_with(COMPACTION_SUMMARY_HEADER)
        ),
        _ => false,
    }
}
