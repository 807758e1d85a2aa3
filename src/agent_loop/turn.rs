use super::helpers::send_event;
use super::llm::{CallError, call_llm_with_retry};
use super::{AgentLoop, OVERFLOW_RECOVERY_HINT, OVERFLOW_RETRY_NOTICE};
use crate::context::{CompactionController, CompactionTrigger};
use crate::events::AgentEvent;
use crate::llm::{ChatRequest, ChatResponse, LlmProvider, Message};
use crate::stores::TranscriptStore;
use crate::types::{AgentError, TokenUsage, TurnOutcome};
use log::{error, info, warn};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

impl<P, S> AgentLoop<P, S>
where
    P: LlmProvider + 'static,
    S: TranscriptStore + 'static,
{
    /// Run one user turn to completion.
    ///
    /// The controller must belong to the same session as every earlier turn
    /// so its idempotency flag and record are shared across trigger sites.
    pub async fn run_turn(
        &self,
        controller: &CompactionController<P, S>,
        input: impl Into<String>,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let start = Instant::now();
        let thread_id = controller.thread_id().clone();

        controller.begin_turn();
        send_event(self.hooks.as_ref(), AgentEvent::start(thread_id.clone(), 1)).await;

        if let Err(e) = self
            .store
            .append(&thread_id, Message::user(input.into()))
            .await
        {
            return self
                .fail(AgentError::new(format!("Failed to store message: {e:#}"), false))
                .await;
        }

        self.auto_compact(controller, CompactionTrigger::PreRequest, cancel)
            .await;

        let mut total_usage = TokenUsage::default();

        for iteration in 1..=self.config.max_iterations {
            if cancel.is_cancelled() {
                info!("Turn cancelled (thread_id={thread_id}, iteration={iteration})");
                return TurnOutcome::Cancelled;
            }

            self.auto_compact(controller, CompactionTrigger::ContextTransform, cancel)
                .await;

            let response = match self.request(controller, cancel).await {
                Ok(response) => response,
                Err(CallError::Cancelled) => return TurnOutcome::Cancelled,
                Err(CallError::Failed(e)) => return self.fail(e).await,
                Err(CallError::Overflow(message)) => {
                    return self.fail(overflow_error(&message)).await;
                }
            };

            let usage = TokenUsage::from(response.usage);
            total_usage.add(&usage);

            let text = response.text();
            if !text.is_empty() {
                send_event(self.hooks.as_ref(), AgentEvent::text(&response.id, &text)).await;
            }

            let message = response.into_message();
            let tool_calls: Vec<(String, String, serde_json::Value)> = message
                .tool_calls()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();

            if let Err(e) = self.store.append(&thread_id, message).await {
                return self
                    .fail(AgentError::new(format!("Failed to store message: {e:#}"), false))
                    .await;
            }
            send_event(
                self.hooks.as_ref(),
                AgentEvent::turn_complete(iteration, usage),
            )
            .await;

            if tool_calls.is_empty() {
                send_event(
                    self.hooks.as_ref(),
                    AgentEvent::done(thread_id, iteration, total_usage, start.elapsed()),
                )
                .await;
                return TurnOutcome::Done {
                    text,
                    iterations: iteration,
                    usage: total_usage,
                };
            }

            for (id, name, input) in tool_calls {
                send_event(
                    self.hooks.as_ref(),
                    AgentEvent::tool_call_start(&id, &name, input.clone()),
                )
                .await;

                let result = self.tools.execute(&name, input).await;
                self.hooks.post_tool_use(&name, &result).await;
                send_event(
                    self.hooks.as_ref(),
                    AgentEvent::tool_call_end(&id, &name, result.clone()),
                )
                .await;

                let tool_message = Message::tool_result(id, name, result.output, !result.success);
                if let Err(e) = self.store.append(&thread_id, tool_message).await {
                    return self
                        .fail(AgentError::new(format!("Failed to store tool result: {e:#}"), false))
                        .await;
                }
            }
        }

        warn!(
            "Iteration limit reached (thread_id={thread_id}, max_iterations={})",
            self.config.max_iterations
        );
        TurnOutcome::MaxIterations {
            iterations: self.config.max_iterations,
            usage: total_usage,
        }
    }

    /// Threshold-triggered compaction; only successes produce a notice.
    async fn auto_compact(
        &self,
        controller: &CompactionController<P, S>,
        trigger: CompactionTrigger,
        cancel: &CancellationToken,
    ) {
        let outcome = controller.check_and_compact(false, true, cancel).await;
        if let Some(notice) = outcome.notice(trigger) {
            send_event(self.hooks.as_ref(), AgentEvent::notice(notice)).await;
        }
    }

    /// Send the current context, compacting and retrying once on overflow.
    async fn request(
        &self,
        controller: &CompactionController<P, S>,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, CallError> {
        let original = match self.request_once(controller, cancel).await {
            Err(CallError::Overflow(message)) => message,
            other => return other,
        };

        warn!(
            "Context overflow, compacting before retry (thread_id={}, error={original})",
            controller.thread_id()
        );
        send_event(
            self.hooks.as_ref(),
            AgentEvent::context_overflow(OVERFLOW_RETRY_NOTICE),
        )
        .await;

        let outcome = controller.force_compact(cancel).await;
        if let Some(notice) = outcome.notice(CompactionTrigger::OverflowRetry) {
            send_event(self.hooks.as_ref(), AgentEvent::notice(notice)).await;
        }
        if !outcome.is_compacted() {
            return Err(CallError::Overflow(original));
        }

        match self.request_once(controller, cancel).await {
            Err(CallError::Overflow(_)) => Err(CallError::Overflow(original)),
            other => other,
        }
    }

    async fn request_once(
        &self,
        controller: &CompactionController<P, S>,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, CallError> {
        let messages = controller.model_context().await.map_err(|e| {
            CallError::Failed(AgentError::new(
                format!("Failed to load context: {e:#}"),
                false,
            ))
        })?;

        let request = ChatRequest {
            system: self.config.system_prompt.clone(),
            messages,
            tools: (!self.tools.is_empty()).then(|| self.tools.to_llm_tools()),
            max_tokens: self.config.max_tokens,
        };

        call_llm_with_retry(self.provider.as_ref(), request, &self.config, cancel).await
    }

    async fn fail(&self, error: AgentError) -> TurnOutcome {
        error!("Turn failed (error={error}, recoverable={})", error.recoverable);
        send_event(
            self.hooks.as_ref(),
            AgentEvent::error(&error.message, error.recoverable),
        )
        .await;
        TurnOutcome::Error(error)
    }
}

/// The provider's overflow message with a pointer to manual recovery.
fn overflow_error(message: &str) -> AgentError {
    AgentError::new(format!("{message}\n\n{OVERFLOW_RECOVERY_HINT}"), false)
}
