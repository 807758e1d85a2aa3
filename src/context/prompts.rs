//! Prompt templates for compaction summaries.

/// System prompt for the summarization call.
pub const SUMMARY_SYSTEM_PROMPT: &str = "You are a precise summarizer for an AI coding assistant. \
Your summaries let the assistant continue the work without the original transcript, \
so keep every technical detail it would need: file paths, function names, commands and error messages.";

/// Header of the synthetic message that carries the summary to the model.
pub const COMPACTION_SUMMARY_HEADER: &str = "[Compaction summary]";

/// Assistant acknowledgement placed after the summary when the kept
/// transcript starts with a user message.
pub const COMPACTION_ACK_TEXT: &str =
    "I understand the context from the summary. Let me continue from where we left off.";

/// Structure every summary must follow.
pub const SUMMARY_OUTPUT_FORMAT: &str = r"Respond with markdown only, using exactly these sections:

## Goal
[What the user is trying to accomplish]

## Constraints & Preferences
- [Requirements, constraints, style preferences]

## Progress
### Done
- [x] [Completed work, with file paths]
### In Progress
- [ ] [Work currently under way]

## Key Decisions
- **[Decision]**: [Rationale]

## Next Steps
1. [Immediate next step]

## Files Touched
### Read
- [path]
### Modified
- [path]

## Critical Context
- [Anything else required to continue]";

/// Prompt for a session that has never been compacted.
#[must_use]
pub fn fresh_summary_prompt(serialized_messages: &str) -> String {
    format!(
        r"Summarize the conversation transcript below so the assistant can continue the work without losing critical context.

{SUMMARY_OUTPUT_FORMAT}

Conversation transcript:
{serialized_messages}"
    )
}

/// Prompt that folds a new transcript slice into an existing summary.
#[must_use]
pub fn update_summary_prompt(previous_summary: &str, serialized_messages: &str) -> String {
    format!(
        r"Update the existing summary with the new conversation transcript below.
Preserve and merge everything from the previous summary that still matters, add what the new transcript contributes, and drop details that are no longer relevant.

{SUMMARY_OUTPUT_FORMAT}

Previous summary:
{previous_summary}

New transcript:
{serialized_messages}"
    )
}

/// Pick the fresh or update prompt; a blank previous summary counts as none.
#[must_use]
pub fn build_summary_prompt(serialized_messages: &str, previous_summary: Option<&str>) -> String {
    match previous_summary.map(str::trim) {
        Some(previous) if !previous.is_empty() => {
            update_summary_prompt(previous, serialized_messages)
        }
        _ => fresh_summary_prompt(serialized_messages),
    }
}
