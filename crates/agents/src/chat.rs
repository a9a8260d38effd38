//! `agent_seed_chat` — a general tool-using chat agent. One LLM round trip
//! per `run()` call; yields text/reasoning as it's produced, then either
//! `tool_call`s (if the model wants to call tools) or `done` (if it gave a
//! final answer).

use async_trait::async_trait;
use futures_util::StreamExt;
use seed_domain::{BoxStream, StreamChunk, ToolCallRequest};

use crate::agent::Agent;
use crate::context::AgentContext;
use crate::output::AgentOutput;

pub struct ChatAgent {
    id: String,
    display_name: String,
    description: String,
    tool_groups: Vec<String>,
}

impl ChatAgent {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: "Seed Chat".into(),
            description: "General-purpose tool-using conversational agent.".into(),
            tool_groups: Vec::new(),
        }
    }

    pub fn with_tool_groups(mut self, groups: Vec<String>) -> Self {
        self.tool_groups = groups;
        self
    }
}

#[async_trait]
impl Agent for ChatAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn tool_groups(&self) -> &[String] {
        &self.tool_groups
    }

    async fn run(&self, ctx: AgentContext) -> BoxStream<'static, AgentOutput> {
        Box::pin(async_stream::stream! {
            if ctx.streaming_enabled {
                match ctx.llm.stream(&ctx.history, &ctx.tool_definitions).await {
                    Ok(mut chunks) => {
                        let mut text = String::new();
                        let mut tool_calls: Vec<ToolCallRequest> = Vec::new();
                        let mut failed = false;

                        while let Some(chunk) = chunks.next().await {
                            match &chunk {
                                StreamChunk::Text { text: delta } => {
                                    text.push_str(delta);
                                    yield AgentOutput::Text { text: delta.clone() };
                                }
                                StreamChunk::Reasoning { text: delta } => {
                                    yield AgentOutput::Reasoning { text: delta.clone() };
                                }
                                StreamChunk::ToolCallFinished { call_id, tool_name, arguments } => {
                                    tool_calls.push(ToolCallRequest {
                                        tool_call_id: call_id.clone(),
                                        tool_name: tool_name.clone(),
                                        arguments: arguments.clone(),
                                    });
                                }
                                StreamChunk::Error { message } => {
                                    yield AgentOutput::Failed { reason: message.clone() };
                                    failed = true;
                                }
                                StreamChunk::Done { .. } | StreamChunk::ToolCallStarted { .. } | StreamChunk::ToolCallDelta { .. } => {}
                            }
                            ctx.emit_chunk(chunk);
                        }

                        if failed {
                            return;
                        }
                        if tool_calls.is_empty() {
                            yield AgentOutput::Done { summary: Some(text) };
                        } else {
                            for call in tool_calls {
                                yield AgentOutput::ToolCall { tool_call: call };
                            }
                        }
                    }
                    Err(e) => yield AgentOutput::Failed { reason: e.to_string() },
                }
            } else {
                match ctx.llm.complete(&ctx.history, &ctx.tool_definitions).await {
                    Ok(completion) => {
                        if let Some(reasoning) = completion.reasoning {
                            yield AgentOutput::Reasoning { text: reasoning };
                        }
                        if completion.is_final() {
                            if let Some(text) = &completion.content {
                                yield AgentOutput::Text { text: text.clone() };
                            }
                            yield AgentOutput::Done { summary: completion.content };
                        } else {
                            if let Some(text) = completion.content {
                                yield AgentOutput::Text { text };
                            }
                            for call in completion.tool_calls {
                                yield AgentOutput::ToolCall { tool_call: call };
                            }
                        }
                    }
                    Err(e) => yield AgentOutput::Failed { reason: e.to_string() },
                }
            }
        })
    }
}
