//! Tool definition and registry.
//!
//! Concrete tools (shell, file edit, search) live with the host. The agent
//! loop only needs to describe them to the model and run the ones it asks
//! for, so every tool call gets exactly one tool result.
//!
//! # Example
//!
//! ```ignore
//! struct Clock;
//!
//! impl Tool for Clock {
//!     fn name(&self) -> &'static str { "clock" }
//!     fn description(&self) -> &'static str { "Current UTC time" }
//!     fn input_schema(&self) -> Value { json!({"type": "object"}) }
//!
//!     async fn execute(&self, _input: Value) -> Result<ToolResult> {
//!         Ok(ToolResult::success(OffsetDateTime::now_utc().to_string()))
//!     }
//! }
//! ```

use crate::llm;
use crate::types::ToolResult;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Definition of a tool that can be called by the agent.
///
/// Uses native async functions in traits; implementors do not need
/// `async_trait`.
pub trait Tool: Send + Sync {
    /// Name the model uses to call the tool.
    fn name(&self) -> &'static str;

    /// Human-readable description of what the tool does.
    fn description(&self) -> &'static str;

    /// JSON schema for the tool's input parameters.
    fn input_schema(&self) -> Value;

    /// Execute the tool with the given input.
    ///
    /// # Errors
    /// Returns an error if tool execution fails.
    fn execute(&self, input: Value) -> impl Future<Output = Result<ToolResult>> + Send;
}

/// Object-safe form of [`Tool`] for registry storage.
#[async_trait]
pub trait ErasedTool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> Value;
    async fn execute(&self, input: Value) -> Result<ToolResult>;
}

struct ToolWrapper<T: Tool> {
    inner: T,
}

#[async_trait]
impl<T: Tool + 'static> ErasedTool for ToolWrapper<T> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn description(&self) -> &'static str {
        self.inner.description()
    }

    fn input_schema(&self) -> Value {
        self.inner.input_schema()
    }

    async fn execute(&self, input: Value) -> Result<ToolResult> {
        self.inner.execute(input).await
    }
}

/// Registry of available tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ErasedTool>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name, replacing any previous tool with
    /// that name.
    pub fn register<T>(&mut self, tool: T) -> &mut Self
    where
        T: Tool + 'static,
    {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(ToolWrapper { inner: tool }));
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ErasedTool>> {
        self.tools.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool call. Unknown tools and tool errors become error results.
    pub async fn execute(&self, name: &str, input: Value) -> ToolResult {
        let Some(tool) = self.get(name) else {
            return ToolResult::error(format!("Unknown tool: {name}"));
        };

        let start = std::time::Instant::now();
        let result = match tool.execute(input).await {
            Ok(result) => result,
            Err(e) => ToolResult::error(format!("Tool error: {e:#}")),
        };
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        result.with_duration(duration_ms)
    }

    /// Tool definitions in the form sent to the model, sorted by name.
    #[must_use]
    pub fn to_llm_tools(&self) -> Vec<llm::Tool> {
        let mut tools: Vec<_> = self
            .tools
            .values()
            .map(|tool| llm::Tool {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::EchoTool;
    use anyhow::bail;
    use serde_json::json;

    struct BrokenTool;

    impl Tool for BrokenTool {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn description(&self) -> &'static str {
            "Always fails"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, _input: Value) -> Result<ToolResult> {
            bail!("disk on fire")
        }
    }

    #[test]
    fn test_registry_lists_tools() {
        let mut registry = ToolRegistry::new();
        assert!(registry.is_empty());

        registry.register(EchoTool).register(BrokenTool);

        assert_eq!(registry.len(), 2);
        let names: Vec<String> = registry.to_llm_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["broken", "echo"]);
    }

    #[tokio::test]
    async fn test_execute_known_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        let result = registry.execute("echo", json!({"message": "hi"})).await;

        assert!(result.success);
        assert_eq!(result.output, "Echo: hi");
        assert!(result.duration_ms.is_some());
    }

    #[tokio::test]
    async fn test_unknown_tool_yields_error_result() {
        let registry = ToolRegistry::new();
        let result = registry.execute("missing", json!({})).await;

        assert!(!result.success);
        assert_eq!(result.output, "Unknown tool: missing");
    }

    #[tokio::test]
    async fn test_tool_error_yields_error_result() {
        let mut registry = ToolRegistry::new();
        registry.register(BrokenTool);

        let result = registry.execute("broken", json!({})).await;

        assert!(!result.success);
        assert!(result.output.contains("disk on fire"));
    }
}
