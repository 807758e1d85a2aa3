//! User-invoked session commands.

use crate::context::{CompactionController, CompactionOutcome};
use crate::llm::LlmProvider;
use crate::stores::TranscriptStore;
use log::info;
use tokio_util::sync::CancellationToken;

/// Result of running a command: the outcome, if anything ran, and the line
/// to show the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOutput {
    pub outcome: Option<CompactionOutcome>,
    pub notice: String,
}

/// `/compact`: summarize the session now, regardless of size.
///
/// Always reports what happened, including when there was nothing to do.
pub struct CompactCommand<'a, P: LlmProvider, S: TranscriptStore> {
    controller: &'a CompactionController<P, S>,
}

impl<'a, P: LlmProvider, S: TranscriptStore> CompactCommand<'a, P, S> {
    pub const NAME: &'static str = "/compact";
    pub const USAGE: &'static str = "Usage: /compact";

    #[must_use]
    pub const fn new(controller: &'a CompactionController<P, S>) -> Self {
        Self { controller }
    }

    /// Run the command with the text that followed its name.
    pub async fn execute(&self, args: &str, cancel: &CancellationToken) -> CommandOutput {
        if !args.trim().is_empty() {
            return CommandOutput {
                outcome: None,
                notice: Self::USAGE.to_string(),
            };
        }

        let outcome = self.controller.force_compact(cancel).await;
        info!(
            "Manual compaction finished (thread_id={}, outcome={outcome:?})",
            self.controller.thread_id()
        );

        let notice = outcome.manual_notice();
        CommandOutput {
            outcome: Some(outcome),
            notice,
        }
    }
}
