//! Agent lifecycle hooks for customization.
//!
//! - [`AgentHooks::on_event`] - Log or process events, including the
//!   compaction status updates
//! - [`AgentHooks::post_tool_use`] - React to tool completion
//!
//! # Built-in Implementations
//!
//! - [`DefaultHooks`] - Ignores everything
//! - [`LoggingHooks`] - Debug logging for all events

use crate::events::AgentEvent;
use crate::types::ToolResult;
use async_trait::async_trait;
use log::debug;

/// Lifecycle hooks for the agent loop and the compaction controller.
/// Implement this trait to observe a session.
#[async_trait]
pub trait AgentHooks: Send + Sync {
    /// Called when the agent or the controller emits an event.
    /// Can be used for logging, status lines, or custom handling.
    async fn on_event(&self, _event: &AgentEvent) {
        // Default: no-op
    }

    /// Called after a tool completes execution.
    async fn post_tool_use(&self, _tool_name: &str, _result: &ToolResult) {
        // Default: no-op
    }
}

/// Hooks that do nothing
pub struct DefaultHooks;

#[async_trait]
impl AgentHooks for DefaultHooks {}

/// Hooks that log all events (useful for debugging)
pub struct LoggingHooks;

#[async_trait]
impl AgentHooks for LoggingHooks {
    async fn on_event(&self, event: &AgentEvent) {
        debug!("Agent event (event={event:?})");
    }

    async fn post_tool_use(&self, tool_name: &str, result: &ToolResult) {
        debug!(
            "Post-tool use (tool={tool_name}, success={}, duration_ms={:?})",
            result.success, result.duration_ms
        );
    }
}
