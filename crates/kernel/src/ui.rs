//! The `ui$` channel (§4.8 "Streaming", §6 WebSocket `ui` channel): a
//! broadcast of ephemeral, per-task UI deltas that never touch the event
//! log — stream chunks, tool-call lifecycle markers, and terminal output.
//! Unlike `events$` this channel has no replay story; a client that
//! reconnects mid-turn simply misses what it missed.

use seed_agents::AgentOutput;
use seed_domain::StreamChunk;
use tokio::sync::broadcast;

const UI_CHANNEL_CAPACITY: usize = 2048;

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type")]
pub enum UiEvent {
    #[serde(rename = "agent_output")]
    AgentOutput { output: AgentOutput },
    #[serde(rename = "stream_delta")]
    StreamDelta { chunk: StreamChunk },
    #[serde(rename = "tool_call_start")]
    ToolCallStart { tool_call_id: String, tool_name: String },
    #[serde(rename = "tool_call_end")]
    ToolCallEnd { tool_call_id: String, is_error: bool },
    #[serde(rename = "stream_end")]
    StreamEnd,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct UiEnvelope {
    pub task_id: String,
    pub event: UiEvent,
}

/// Fan-out hub for `UiEnvelope`s; one per kernel instance, shared by every
/// `AgentRuntime`.
pub struct UiBus {
    publish: broadcast::Sender<UiEnvelope>,
}

impl Default for UiBus {
    fn default() -> Self {
        Self {
            publish: broadcast::channel(UI_CHANNEL_CAPACITY).0,
        }
    }
}

impl UiBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, task_id: &str, event: UiEvent) {
        let _ = self.publish.send(UiEnvelope {
            task_id: task_id.to_string(),
            event,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEnvelope> {
        self.publish.subscribe()
    }
}
