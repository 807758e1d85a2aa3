//! Host agent loop with compaction wired into every trigger site.
//!
//! A turn compacts at most once through the automatic triggers:
//! - before the first model request (pre-request)
//! - before every model request, including follow-ups after tool results
//!   (context transform; a no-op once the turn compacted)
//!
//! If the provider still rejects a request as too large, the loop forces one
//! compaction and retries that request exactly once.

mod helpers;
mod llm;
mod turn;


use crate::context::{CompactionConfig, CompactionController};
use crate::hooks::{AgentHooks, DefaultHooks};
use crate::llm::LlmProvider;
use crate::stores::TranscriptStore;
use crate::tools::ToolRegistry;
use crate::types::{AgentConfig, ThreadId};
use std::sync::Arc;

/// Shown when a request overflowed and a forced compaction is attempted.
pub const OVERFLOW_RETRY_NOTICE: &str = "Context overflow detected. Compacting and retrying once...";

/// Appended to the provider's overflow message when recovery failed.
pub const OVERFLOW_RECOVERY_HINT: &str =
    "Context is still too large after compaction. Use /compact or /clear and retry.";

/// Runs user turns against a provider, a transcript store and tools.
///
/// # Example
///
/// ```ignore
/// let agent = AgentLoop::new(provider, InMemoryStore::new(), AgentConfig::default())
///     .with_tools(tools)
///     .with_hooks(Arc::new(LoggingHooks));
///
/// let controller = agent.controller(ThreadId::new());
/// let outcome = agent.run_turn(&controller, "Fix the failing test", &cancel).await;
/// ```
pub struct AgentLoop<P, S> {
    provider: Arc<P>,
    store: Arc<S>,
    tools: Arc<ToolRegistry>,
    hooks: Arc<dyn AgentHooks>,
    config: AgentConfig,
    compaction: CompactionConfig,
}

impl<P, S> AgentLoop<P, S>
where
    P: LlmProvider + 'static,
    S: TranscriptStore + 'static,
{
    #[must_use]
    pub fn new(provider: P, store: S, config: AgentConfig) -> Self {
        Self::from_shared(Arc::new(provider), Arc::new(store), config)
    }

    /// Build from a provider and store the host keeps using elsewhere.
    #[must_use]
    pub fn from_shared(provider: Arc<P>, store: Arc<S>, config: AgentConfig) -> Self {
        Self {
            provider,
            store,
            tools: Arc::new(ToolRegistry::new()),
            hooks: Arc::new(DefaultHooks),
            config,
            compaction: CompactionConfig::default(),
        }
    }

    #[must_use]
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Arc::new(tools);
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn AgentHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub fn with_compaction(mut self, compaction: CompactionConfig) -> Self {
        self.compaction = compaction;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Create the compaction controller for one session.
    ///
    /// Keep it for the lifetime of the session and pass it to every
    /// [`Self::run_turn`] and `/compact` invocation.
    #[must_use]
    pub fn controller(&self, thread_id: ThreadId) -> CompactionController<P, S> {
        CompactionController::new(
            thread_id,
            Arc::clone(&self.provider),
            Arc::clone(&self.store),
            self.compaction.clone(),
        )
        .with_hooks(Arc::clone(&self.hooks))
    }
}
