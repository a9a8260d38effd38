use serde::Serialize;

/// Structured trace events emitted across the Seed crates, in addition to
/// ordinary `tracing` spans. These are the events worth grepping for in
/// aggregate (e.g. "how many tool calls were denied today") rather than
/// read one span at a time.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    TaskCreated {
        task_id: String,
        agent_id: Option<String>,
        parent_task_id: Option<String>,
    },
    TaskStatusChanged {
        task_id: String,
        from: String,
        to: String,
    },
    EventAppended {
        stream_id: String,
        seq: u64,
        event_type: String,
    },
    ToolCallRequested {
        task_id: String,
        tool_call_id: String,
        tool_name: String,
        requires_confirmation: bool,
    },
    ToolCallCompleted {
        task_id: String,
        tool_call_id: String,
        tool_name: String,
        duration_ms: u64,
        is_error: bool,
    },
    ToolCallDenied {
        task_id: String,
        tool_call_id: String,
        tool_name: String,
    },
    InteractionRequested {
        task_id: String,
        interaction_id: String,
        kind: String,
    },
    InteractionResponded {
        task_id: String,
        interaction_id: String,
        stale: bool,
    },
    InteractionTimedOut {
        task_id: String,
        interaction_id: String,
    },
    SubtaskSpawned {
        parent_task_id: String,
        child_task_id: String,
        depth: u32,
    },
    SubtaskCascadeCanceled {
        parent_task_id: String,
        child_task_id: String,
    },
    ProjectionCheckpointed {
        task_id: String,
        seq: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "seed_event");
    }
}
