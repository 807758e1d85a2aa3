//! Agent Compaction - context compaction for long-running LLM agent sessions.
//!
//! This crate keeps an agent's transcript inside the model's context window:
//! - Token estimation and threshold detection
//! - Tool-call-safe retention boundaries
//! - LLM summarization of the dropped prefix, merged across compactions
//! - Provider overflow recognition with a single compact-and-retry
//! - A `/compact` command for explicit compaction
//!
//! # Example
//!
//! ```ignore
//! use agent_compaction::{
//!     AgentConfig, AgentLoop, InMemoryStore, LoggingHooks, ThreadId,
//!     context::CompactionConfig,
//! };
//!
//! let agent = AgentLoop::new(provider, InMemoryStore::new(), AgentConfig::default())
//!     .with_hooks(Arc::new(LoggingHooks))
//!     .with_compaction(CompactionConfig::default().with_max_tokens(128_000));
//!
//! let controller = agent.controller(ThreadId::new());
//! let cancel = CancellationToken::new();
//!
//! let outcome = agent.run_turn(&controller, "Hello!", &cancel).await;
//! println!("{outcome:?}");
//! ```

#![forbid(unsafe_code)]

mod agent_loop;
pub mod commands;
pub mod context;
pub mod events;
mod hooks;
pub mod llm;
pub mod stores;
mod tools;
mod types;

#[cfg(test)]
mod test_utils;

pub use agent_loop::{AgentLoop, OVERFLOW_RECOVERY_HINT, OVERFLOW_RETRY_NOTICE};
pub use commands::{CommandOutput, CompactCommand};
pub use events::AgentEvent;
pub use hooks::{AgentHooks, DefaultHooks, LoggingHooks};
pub use llm::LlmProvider;
pub use stores::{InMemoryStore, SessionState, TranscriptStore};
pub use tools::{Tool, ToolRegistry};
pub use types::{
    AgentConfig, AgentError, RetryConfig, ThreadId, TokenUsage, ToolResult, TurnOutcome,
};
