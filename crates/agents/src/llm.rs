//! The LLM boundary an `Agent` calls through. One real implementation lives
//! outside this crate (a provider adapter); tests use [`crate::fake::FakeLlmClient`].

use async_trait::async_trait;
use seed_domain::{BoxStream, LlmMessage, Result, StreamChunk, ToolCallRequest, ToolDefinition, Usage};

/// The result of one non-streaming completion call.
#[derive(Debug, Clone, Default)]
pub struct LlmCompletion {
    pub content: Option<String>,
    pub reasoning: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: Option<Usage>,
    /// Provider-reported stop reason (e.g. `"end_turn"`, `"tool_use"`).
    pub stop_reason: String,
}

impl LlmCompletion {
    /// True when the model has no further tool calls to make — i.e. this
    /// is the agent's final answer for the turn.
    pub fn is_final(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

/// Provider-agnostic chat completion boundary, mirroring the shape of a
/// production `LlmProvider` adapter without committing this crate to any
/// one vendor SDK.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[LlmMessage],
        tools: &[ToolDefinition],
    ) -> Result<LlmCompletion>;

    /// Streaming variant; used when `AgentContext::streaming_enabled` is
    /// set (§4.8 "Streaming"). Default implementation falls back to
    /// `complete` and replays it as a single `Done` chunk, so a client only
    /// has to implement true streaming where it matters.
    async fn stream(
        &self,
        messages: &[LlmMessage],
        tools: &[ToolDefinition],
    ) -> Result<BoxStream<'static, StreamChunk>> {
        let completion = self.complete(messages, tools).await;
        Ok(Box::pin(async_stream::stream! {
            match completion {
                Ok(completion) => {
                    if let Some(text) = completion.content {
                        yield StreamChunk::Text { text };
                    }
                    for call in completion.tool_calls {
                        yield StreamChunk::ToolCallFinished {
                            call_id: call.tool_call_id,
                            tool_name: call.tool_name,
                            arguments: call.arguments,
                        };
                    }
                    yield StreamChunk::Done {
                        usage: completion.usage,
                        finish_reason: Some(completion.stop_reason),
                    };
                }
                Err(e) => yield StreamChunk::Error { message: e.to_string() },
            }
        }))
    }
}
