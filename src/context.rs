//! Context compaction for long-running conversations.
//!
//! When the transcript grows past the model's usable window, everything
//! before a structurally safe cut point is summarized by the LLM and dropped.
//! The summary lives in a [`CompactionRecord`] beside the transcript and is
//! prepended to the messages only when they are sent to the model.
//!
//! # Overview
//!
//! 1. [`CompactionController::check_and_compact`] checks the estimated size
//!    against [`CompactionConfig::threshold_tokens`]
//! 2. [`ContextSummarizer::calculate_retention_boundary`] picks the cut, never
//!    separating a tool call from its result
//! 3. The prefix is serialized to flat text and summarized in one LLM call,
//!    merged with the previous summary if there is one
//! 4. The store drops the prefix and keeps the new record in one step
//!
//! At most one summarization runs per user turn unless compaction is forced.
//! Failures are reported as [`CompactionOutcome::Failed`] and leave the
//! session untouched.
//!
//! # Example
//!
//! ```ignore
//! use agent_compaction::context::{CompactionConfig, CompactionController};
//!
//! let controller = CompactionController::new(thread_id, provider, store, CompactionConfig::default());
//! controller.begin_turn();
//! let outcome = controller.check_and_compact(false, true, &cancel).await;
//! let messages = controller.model_context().await?;
//! ```

mod config;
mod controller;
mod estimator;
mod outcome;
mod prompts;
mod record;
mod summarizer;

pub use config::CompactionConfig;
pub use controller::{CompactionController, inject_summary, is_summary_message};
pub use estimator::TokenEstimator;
pub use outcome::{CompactionOutcome, CompactionTrigger};
pub use prompts::{
    COMPACTION_ACK_TEXT, COMPACTION_SUMMARY_HEADER, SUMMARY_SYSTEM_PROMPT, build_summary_prompt,
};
pub use record::CompactionRecord;
pub use summarizer::{ContextSummarizer, calculate_retention_boundary, serialize_messages};
