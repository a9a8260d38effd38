use seed_domain::{InteractionRequest, ToolCallRequest};
use serde::Serialize;

/// One unit of work yielded by an agent's lazy output sequence (§3
/// "AgentOutput", §4.11). The agent is risk-unaware: it yields `tool_call`
/// uniformly regardless of risk level; the Output Handler enforces policy.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum AgentOutput {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "reasoning")]
    Reasoning { text: String },

    /// Low-priority debug narration (e.g. "calling tool X"), forwarded to
    /// the UI but never persisted as conversation history.
    #[serde(rename = "verbose")]
    Verbose { text: String },

    #[serde(rename = "error")]
    Error { message: String },

    #[serde(rename = "tool_call")]
    ToolCall { tool_call: ToolCallRequest },

    #[serde(rename = "interaction")]
    Interaction { request: InteractionRequest },

    #[serde(rename = "done")]
    Done { summary: Option<String> },

    #[serde(rename = "failed")]
    Failed { reason: String },
}
