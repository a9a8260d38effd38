use std::sync::Arc;

use seed_domain::{InteractionResponse, LlmMessage, StreamChunk, ToolDefinition};

use crate::llm::LlmClient;

/// Everything an `Agent::run` needs to produce one pass of output: the
/// conversation so far, the tools it may call, and (if it's resuming from
/// a pause) the interaction response that triggered the resume.
pub struct AgentContext {
    pub task_id: String,
    pub history: Vec<LlmMessage>,
    pub tool_definitions: Vec<ToolDefinition>,
    pub llm: Arc<dyn LlmClient>,
    pub streaming_enabled: bool,
    /// Set by `AgentRuntime::resume` when this pass is driven by a UIP
    /// response rather than a fresh instruction (§4.8).
    pub pending_interaction_response: Option<InteractionResponse>,
    /// Forwarded `text`/`reasoning` stream chunks when streaming is
    /// enabled; `None` when running non-streaming.
    pub on_stream_chunk: Option<Arc<dyn Fn(StreamChunk) + Send + Sync>>,
}

impl AgentContext {
    pub fn emit_chunk(&self, chunk: StreamChunk) {
        if let Some(cb) = &self.on_stream_chunk {
            cb(chunk);
        }
    }
}
