//! Compaction walkthrough against a local stand-in model.
//!
//! Runs a few turns with a deliberately tiny context window so automatic
//! compaction kicks in, then compacts once more through `/compact`.
//!
//! # Running
//!
//! ```bash
//! RUST_LOG=agent_compaction=debug cargo run --example compact_session
//! ```

use agent_compaction::context::{CompactionConfig, SUMMARY_SYSTEM_PROMPT};
use agent_compaction::llm::{
    ChatOutcome, ChatRequest, ChatResponse, ContentBlock, LlmProvider, StopReason, Usage,
};
use agent_compaction::{
    AgentConfig, AgentEvent, AgentHooks, AgentLoop, CompactCommand, InMemoryStore, ThreadId,
    TranscriptStore,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

/// Answers every turn with a long canned reply and summarizes by counting.
struct LocalModel {
    summaries: AtomicUsize,
}

#[async_trait]
impl LlmProvider for LocalModel {
    async fn chat(&self, request: ChatRequest) -> anyhow::Result<ChatOutcome> {
        let text = if request.system == SUMMARY_SYSTEM_PROMPT {
            let n = self.summaries.fetch_add(1, Ordering::SeqCst) + 1;
            format!("## Goal\nDemo session\n\n## Progress\n- Summary #{n} of earlier turns")
        } else {
            let last = request.messages.last().map(|m| m.text()).unwrap_or_default();
            format!("You said: {last}. {}", "Here is a long answer. ".repeat(40))
        };

        Ok(ChatOutcome::Success(ChatResponse {
            id: uuid::Uuid::new_v4().to_string(),
            content: vec![ContentBlock::Text { text }],
            model: "local".to_string(),
            stop_reason: Some(StopReason::EndTurn),
            usage: Usage {
                input_tokens: 0,
                output_tokens: 0,
            },
        }))
    }

    fn model(&self) -> &str {
        "local"
    }

    fn provider(&self) -> &'static str {
        "local"
    }
}

/// Prints user-facing notices as they arrive.
struct PrintNotices;

#[async_trait]
impl AgentHooks for PrintNotices {
    async fn on_event(&self, event: &AgentEvent) {
        match event {
            AgentEvent::Notice { message } | AgentEvent::ContextOverflow { message } => {
                println!("  [notice] {message}");
            }
            AgentEvent::ContextCompacted {
                compaction_count, ..
            } => println!("  [compaction #{compaction_count}]"),
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let compaction = CompactionConfig::default()
        .with_max_tokens(1_500)
        .with_reserve_tokens(200)
        .with_keep_recent_tokens(400);

    let agent = AgentLoop::new(
        LocalModel {
            summaries: AtomicUsize::new(0),
        },
        InMemoryStore::new(),
        AgentConfig::default(),
    )
    .with_hooks(Arc::new(PrintNotices))
    .with_compaction(compaction);

    let thread_id = ThreadId::new();
    let controller = agent.controller(thread_id.clone());
    let cancel = CancellationToken::new();

    for prompt in [
        "Read the build script",
        "Find the failing test",
        "Explain the panic",
        "Propose a fix",
        "Apply it",
    ] {
        println!("> {prompt}");
        let outcome = agent.run_turn(&controller, prompt, &cancel).await;
        let stored = agent.store().count(&thread_id).await?;
        println!("  {outcome:?}\n  ({stored} messages stored)");
    }

    println!("> {}", CompactCommand::<LocalModel, InMemoryStore>::NAME);
    let output = CompactCommand::new(&controller).execute("", &cancel).await;
    println!("  {}", output.notice);

    if let Some(record) = agent.store().compaction_record(&thread_id).await? {
        println!("\nCurrent summary:\n{}", record.summary);
    }

    Ok(())
}
