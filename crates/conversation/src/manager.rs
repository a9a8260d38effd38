//! The Conversation Manager (§4.6): owns every mutation of the Conversation
//! Store from within an agent loop, and reconciles tool results with
//! outstanding tool calls so a crash between "tool executed" and "result
//! recorded" can be repaired idempotently on resume.

use seed_domain::{LlmMessage, Result, ToolCallRequest};

use crate::store::ConversationStore;

pub struct ConversationManager<'a> {
    store: &'a ConversationStore,
}

impl<'a> ConversationManager<'a> {
    pub fn new(store: &'a ConversationStore) -> Self {
        Self { store }
    }

    /// Scan `history` from the end for a `tool` message matching
    /// `tool_call_id`. If present, do nothing (idempotent repair already
    /// happened or was never needed); otherwise append one.
    pub fn persist_tool_result_if_missing(
        &self,
        task_id: &str,
        history: &[LlmMessage],
        tool_call_id: &str,
        tool_name: Option<String>,
        output: &str,
        is_error: bool,
    ) -> Result<bool> {
        let already_present = history
            .iter()
            .rev()
            .any(|m| m.resolved_tool_call_id() == Some(tool_call_id));
        if already_present {
            return Ok(false);
        }

        let content = if is_error {
            format!("Error: {output}")
        } else {
            output.to_string()
        };
        self.store
            .append(task_id, LlmMessage::tool_result(tool_call_id, tool_name, content))?;
        Ok(true)
    }

    /// Tool calls in the last `assistant` message of `history` that have
    /// not yet been resolved by a following `tool` message — the set of
    /// calls an Agent Runtime must still execute (or repair) on resume.
    pub fn pending_tool_calls(history: &[LlmMessage]) -> Vec<ToolCallRequest> {
        let Some(last_assistant_pos) = history.iter().rposition(|m| m.is_assistant()) else {
            return Vec::new();
        };
        let requested = history[last_assistant_pos].tool_calls();
        if requested.is_empty() {
            return Vec::new();
        }
        let resolved: std::collections::HashSet<&str> = history[last_assistant_pos + 1..]
            .iter()
            .filter_map(|m| m.resolved_tool_call_id())
            .collect();
        requested
            .iter()
            .filter(|c| !resolved.contains(c.tool_call_id.as_str()))
            .cloned()
            .collect()
    }
}
