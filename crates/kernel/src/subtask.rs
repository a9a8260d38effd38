//! The subtask pseudo-tool (§4.12): `create_subtask_<agentId>` spawns a
//! child task handled by a specific agent and blocks the calling tool
//! invocation until the child reaches a terminal status.
//!
//! Uses the same `events$` subscribe-before-act pattern as the Interaction
//! Service's `wait_for_response`, but filtered to one child stream instead
//! of one interaction id.

use async_trait::async_trait;
use seed_domain::{DomainEvent, Error, Result, TaskPriority};
use seed_eventstore::EventStore;
use serde_json::Value;

use seed_tools::{RiskLevel, Tool, ToolContext};

/// `{subTaskStatus, summary?, failureReason?}` — the pseudo-tool's result,
/// folded into the calling agent's tool-result message as plain JSON.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct SubtaskResult {
    sub_task_status: SubtaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
#[serde(rename_all = "snake_case")]
enum SubtaskStatus {
    Success,
    Error,
    Cancel,
}

pub struct SubtaskTool {
    agent_id: String,
    name: String,
    event_store: std::sync::Arc<EventStore>,
    max_subtask_depth: u32,
}

impl SubtaskTool {
    pub fn new(agent_id: impl Into<String>, event_store: std::sync::Arc<EventStore>, max_subtask_depth: u32) -> Self {
        let agent_id = agent_id.into();
        let name = format!("create_subtask_{agent_id}");
        Self {
            agent_id,
            name,
            event_store,
            max_subtask_depth,
        }
    }

    /// Number of ancestors `task_id` already has, by walking `parent_task_id`
    /// back to the root. A fresh top-level task has depth 0.
    fn depth_of(&self, task_id: &str) -> u32 {
        let mut depth = 0u32;
        let mut current = task_id.to_string();
        loop {
            let parent = self
                .event_store
                .read_stream(&current, 0)
                .into_iter()
                .find_map(|stored| match stored.event {
                    DomainEvent::TaskCreated { parent_task_id, .. } => Some(parent_task_id),
                    _ => None,
                })
                .flatten();
            match parent {
                Some(p) => {
                    depth += 1;
                    if depth > self.max_subtask_depth + 1 {
                        return depth;
                    }
                    current = p;
                }
                None => return depth,
            }
        }
    }
}

#[async_trait]
impl Tool for SubtaskTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Create a subtask handled by a specific agent and wait for it to finish."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "intent": { "type": "string" },
            },
            "required": ["title", "intent"]
        })
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Safe
    }

    fn group(&self) -> Option<&str> {
        Some("subtask")
    }

    fn can_execute(&self, args: &Value, ctx: &ToolContext) -> std::result::Result<(), String> {
        args.get("title").and_then(|v| v.as_str()).ok_or("missing required argument: title")?;
        args.get("intent").and_then(|v| v.as_str()).ok_or("missing required argument: intent")?;
        if self.depth_of(&ctx.task_id) >= self.max_subtask_depth {
            return Err(format!("subtask depth exceeded: max {}", self.max_subtask_depth));
        }
        Ok(())
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        if self.depth_of(&ctx.task_id) >= self.max_subtask_depth {
            return Err(Error::DepthExceeded { max: self.max_subtask_depth });
        }

        let title = args["title"].as_str().unwrap_or_default().to_string();
        let intent = args["intent"].as_str().unwrap_or_default().to_string();
        let child_task_id = format!("task_{}", uuid::Uuid::new_v4());

        // Subscribe before creating the child so its terminal event can
        // never be published and missed between creation and subscribe.
        let mut events = self.event_store.subscribe();

        self.event_store.append_one(DomainEvent::TaskCreated {
            task_id: child_task_id.clone(),
            title,
            intent,
            priority: TaskPriority::Normal,
            agent_id: Some(self.agent_id.clone()),
            parent_task_id: Some(ctx.task_id.clone()),
            author_actor_id: ctx.actor_id.clone(),
        })?;

        loop {
            if ctx.cancel.as_ref().map(|c| c.is_canceled()).unwrap_or(false) {
                // Best-effort cascade-cancel; the child's own runtime will
                // observe `TaskCanceled` through the same routing as any
                // other cancel request.
                let _ = self.event_store.append_one(DomainEvent::TaskCanceled {
                    task_id: child_task_id.clone(),
                    reason: Some("parent task canceled".into()),
                    author_actor_id: "system".into(),
                });
                return Ok(serde_json::to_value(SubtaskResult {
                    sub_task_status: SubtaskStatus::Cancel,
                    summary: None,
                    failure_reason: Some("parent task canceled".into()),
                })?);
            }

            match events.recv().await {
                Ok(stored) if stored.stream_id == child_task_id => match stored.event {
                    DomainEvent::TaskCompleted { summary, .. } => {
                        return Ok(serde_json::to_value(SubtaskResult {
                            sub_task_status: SubtaskStatus::Success,
                            summary,
                            failure_reason: None,
                        })?)
                    }
                    DomainEvent::TaskFailed { reason, .. } => {
                        return Ok(serde_json::to_value(SubtaskResult {
                            sub_task_status: SubtaskStatus::Error,
                            summary: None,
                            failure_reason: Some(reason),
                        })?)
                    }
                    DomainEvent::TaskCanceled { reason, .. } => {
                        return Ok(serde_json::to_value(SubtaskResult {
                            sub_task_status: SubtaskStatus::Cancel,
                            summary: None,
                            failure_reason: reason,
                        })?)
                    }
                    _ => continue,
                },
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                    // Fall back to a direct read of the child's stream.
                    if let Some(result) = self.poll_terminal(&child_task_id) {
                        return Ok(serde_json::to_value(result)?);
                    }
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    return Err(Error::Other("event store closed while awaiting subtask".into()));
                }
            }
        }
    }
}

impl SubtaskTool {
    fn poll_terminal(&self, child_task_id: &str) -> Option<SubtaskResult> {
        self.event_store.read_stream(child_task_id, 0).into_iter().find_map(|stored| match stored.event {
            DomainEvent::TaskCompleted { summary, .. } => Some(SubtaskResult {
                sub_task_status: SubtaskStatus::Success,
                summary,
                failure_reason: None,
            }),
            DomainEvent::TaskFailed { reason, .. } => Some(SubtaskResult {
                sub_task_status: SubtaskStatus::Error,
                summary: None,
                failure_reason: Some(reason),
            }),
            DomainEvent::TaskCanceled { reason, .. } => Some(SubtaskResult {
                sub_task_status: SubtaskStatus::Cancel,
                summary: None,
                failure_reason: reason,
            }),
            _ => None,
        })
    }
}
