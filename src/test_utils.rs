use crate::events::AgentEvent;
use crate::hooks::AgentHooks;
use crate::llm::{ChatOutcome, ChatRequest, ChatResponse, ContentBlock, LlmProvider, StopReason, Usage};
use crate::tools::Tool;
use crate::types::ToolResult;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

// ===================
// Mock LLM Provider
// ===================

/// Provider that replays a script. `Err` entries fail the call itself.
pub struct MockProvider {
    responses: RwLock<Vec<Result<ChatOutcome, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
    call_count: AtomicUsize,
}

impl MockProvider {
    pub fn new(responses: Vec<ChatOutcome>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    pub fn scripted(responses: Vec<Result<ChatOutcome, String>>) -> Self {
        Self {
            responses: RwLock::new(responses),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn text_response(text: &str) -> ChatOutcome {
        ChatOutcome::Success(ChatResponse {
            id: "msg_1".to_string(),
            content: vec![ContentBlock::Text {
                text: text.to_string(),
            }],
            model: "mock-model".to_string(),
            stop_reason: Some(StopReason::EndTurn),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 20,
            },
        })
    }

    pub fn tool_call_response(
        tool_id: &str,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> ChatOutcome {
        ChatOutcome::Success(ChatResponse {
            id: "msg_1".to_string(),
            content: vec![ContentBlock::ToolCall {
                id: tool_id.to_string(),
                name: tool_name.to_string(),
                arguments,
            }],
            model: "mock-model".to_string(),
            stop_reason: Some(StopReason::ToolUse),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 20,
            },
        })
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatOutcome> {
        self.requests.lock().expect("lock poisoned").push(request);
        let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
        let responses = self.responses.read().expect("lock poisoned");
        match responses.get(idx) {
            Some(Ok(outcome)) => Ok(outcome.clone()),
            Some(Err(message)) => Err(anyhow!(message.clone())),
            // Default: end conversation
            None => Ok(Self::text_response("Done")),
        }
    }

    fn model(&self) -> &'static str {
        "mock-model"
    }

    fn provider(&self) -> &'static str {
        "mock"
    }
}

// ===================
// Hooks
// ===================

/// Hooks that keep every event for later assertions.
#[derive(Default)]
pub struct RecordingHooks {
    events: Mutex<Vec<AgentEvent>>,
}

impl RecordingHooks {
    pub fn events(&self) -> Vec<AgentEvent> {
        self.events.lock().expect("lock poisoned").clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                AgentEvent::Notice { message } | AgentEvent::ContextOverflow { message } => {
                    Some(message)
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl AgentHooks for RecordingHooks {
    async fn on_event(&self, event: &AgentEvent) {
        self.events.lock().expect("lock poisoned").push(event.clone());
    }
}

// ===================
// Transcripts
// ===================

/// Alternating user/assistant text messages of `chars` characters each.
pub fn text_transcript(count: usize, chars: usize) -> Vec<crate::llm::Message> {
    (0..count)
        .map(|i| {
            if i % 2 == 0 {
                crate::llm::Message::user("u".repeat(chars))
            } else {
                crate::llm::Message::assistant("a".repeat(chars))
            }
        })
        .collect()
}

// ===================
// Mock Tool
// ===================

pub struct EchoTool;

impl Tool for EchoTool {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn description(&self) -> &'static str {
        "Echo the input message"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "message": { "type": "string" }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolResult> {
        let message = input
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("no message");
        Ok(ToolResult::success(format!("Echo: {message}")))
    }
}
