use super::helpers::calculate_backoff_delay;
use crate::llm::{ChatOutcome, ChatRequest, ChatResponse, LlmProvider, classify_overflow, is_context_overflow};
use crate::types::{AgentConfig, AgentError};
use log::{error, warn};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Why a model request did not produce a response.
#[derive(Debug)]
pub(super) enum CallError {
    /// The provider rejected the request as too large. Carries its message.
    Overflow(String),
    Cancelled,
    Failed(AgentError),
}

/// Call the LLM with retry logic for rate limits and server errors.
///
/// Context overflows are never retried here; the caller decides whether
/// compacting first is worth another attempt.
pub(super) async fn call_llm_with_retry<P>(
    provider: &P,
    request: ChatRequest,
    config: &AgentConfig,
    cancel: &CancellationToken,
) -> Result<ChatResponse, CallError>
where
    P: LlmProvider,
{
    let max_retries = config.retry.max_retries;
    let mut attempt = 0u32;

    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CallError::Cancelled),
            result = provider.chat(request.clone()) => result,
        };

        let outcome = match result {
            Ok(o) => o,
            Err(e) => {
                let message = format!("{e:#}");
                if is_context_overflow(&message) {
                    return Err(CallError::Overflow(message));
                }
                return Err(CallError::Failed(AgentError::new(
                    format!("LLM error: {message}"),
                    false,
                )));
            }
        };

        if let Some(message) = classify_overflow(&outcome) {
            return Err(CallError::Overflow(message));
        }

        match outcome {
            ChatOutcome::Success(response) => return Ok(response),
            ChatOutcome::RateLimited => {
                attempt += 1;
                if attempt > max_retries {
                    error!("Rate limited by LLM provider after {max_retries} retries");
                    return Err(CallError::Failed(AgentError::new(
                        format!("Rate limited after {max_retries} retries"),
                        true,
                    )));
                }
                let delay = calculate_backoff_delay(attempt, &config.retry);
                warn!(
                    "Rate limited, retrying after backoff (attempt={attempt}, delay_ms={})",
                    delay.as_millis()
                );

                sleep(delay).await;
            }
            ChatOutcome::InvalidRequest(msg) => {
                error!("Invalid request to LLM: {msg}");
                return Err(CallError::Failed(AgentError::new(
                    format!("Invalid request: {msg}"),
                    false,
                )));
            }
            ChatOutcome::ServerError(msg) => {
                attempt += 1;
                if attempt > max_retries {
                    error!("LLM server error after {max_retries} retries: {msg}");
                    return Err(CallError::Failed(AgentError::new(
                        format!("Server error after {max_retries} retries: {msg}"),
                        true,
                    )));
                }
                let delay = calculate_backoff_delay(attempt, &config.retry);
                warn!(
                    "Server error, retrying after backoff (attempt={attempt}, delay_ms={}, error={msg})",
                    delay.as_millis()
                );

                sleep(delay).await;
            }
        }
    }
}
