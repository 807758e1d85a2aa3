pub mod overflow;
pub mod types;

pub use overflow::{classify_overflow, is_context_overflow};
pub use types::*;

use anyhow::Result;
use async_trait::async_trait;

/// A model backend able to answer one chat request.
///
/// Compaction reuses whatever provider the session is already talking to.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatOutcome>;
    fn model(&self) -> &str;
    fn provider(&self) -> &'static str;
}
