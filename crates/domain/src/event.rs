use serde::{Deserialize, Serialize};

use crate::interaction::{InteractionRequest, InteractionResponse};
use crate::message::LlmMessage;
use crate::task::{DomainEventKind, TaskPriority};

/// The closed set of domain events a task stream can contain (§3
/// "DomainEvent"). Every event carries `task_id`; most carry
/// `author_actor_id` so the projection and audit trail can tell a
/// user-originated event from an agent/system-originated one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    #[serde(rename = "task_created")]
    TaskCreated {
        task_id: String,
        title: String,
        intent: String,
        #[serde(default)]
        priority: TaskPriority,
        agent_id: Option<String>,
        parent_task_id: Option<String>,
        author_actor_id: String,
    },

    #[serde(rename = "task_started")]
    TaskStarted {
        task_id: String,
        author_actor_id: String,
    },

    #[serde(rename = "task_completed")]
    TaskCompleted {
        task_id: String,
        summary: Option<String>,
        author_actor_id: String,
    },

    #[serde(rename = "task_failed")]
    TaskFailed {
        task_id: String,
        reason: String,
        author_actor_id: String,
    },

    #[serde(rename = "task_canceled")]
    TaskCanceled {
        task_id: String,
        reason: Option<String>,
        author_actor_id: String,
    },

    #[serde(rename = "task_paused")]
    TaskPaused {
        task_id: String,
        reason: Option<String>,
        author_actor_id: String,
    },

    #[serde(rename = "task_resumed")]
    TaskResumed {
        task_id: String,
        author_actor_id: String,
    },

    #[serde(rename = "task_instruction_added")]
    TaskInstructionAdded {
        task_id: String,
        message: LlmMessage,
        author_actor_id: String,
    },

    #[serde(rename = "user_interaction_requested")]
    UserInteractionRequested {
        task_id: String,
        request: InteractionRequest,
        author_actor_id: String,
    },

    #[serde(rename = "user_interaction_responded")]
    UserInteractionResponded {
        task_id: String,
        response: InteractionResponse,
        author_actor_id: String,
    },
}

impl DomainEvent {
    pub fn task_id(&self) -> &str {
        match self {
            Self::TaskCreated { task_id, .. }
            | Self::TaskStarted { task_id, .. }
            | Self::TaskCompleted { task_id, .. }
            | Self::TaskFailed { task_id, .. }
            | Self::TaskCanceled { task_id, .. }
            | Self::TaskPaused { task_id, .. }
            | Self::TaskResumed { task_id, .. }
            | Self::TaskInstructionAdded { task_id, .. }
            | Self::UserInteractionRequested { task_id, .. }
            | Self::UserInteractionResponded { task_id, .. } => task_id,
        }
    }

    pub fn author_actor_id(&self) -> &str {
        match self {
            Self::TaskCreated { author_actor_id, .. }
            | Self::TaskStarted { author_actor_id, .. }
            | Self::TaskCompleted { author_actor_id, .. }
            | Self::TaskFailed { author_actor_id, .. }
            | Self::TaskCanceled { author_actor_id, .. }
            | Self::TaskPaused { author_actor_id, .. }
            | Self::TaskResumed { author_actor_id, .. }
            | Self::TaskInstructionAdded { author_actor_id, .. }
            | Self::UserInteractionRequested { author_actor_id, .. }
            | Self::UserInteractionResponded { author_actor_id, .. } => author_actor_id,
        }
    }

    /// The stream this event belongs to. Every domain event is keyed by its
    /// task (§4.1 "streamId = taskId").
    pub fn stream_id(&self) -> &str {
        self.task_id()
    }

    /// The lightweight tag used by [`crate::task::can_transition`].
    pub fn kind(&self) -> DomainEventKind {
        match self {
            Self::TaskCreated { .. } => DomainEventKind::TaskCreated,
            Self::TaskStarted { .. } => DomainEventKind::TaskStarted,
            Self::TaskCompleted { .. } => DomainEventKind::TaskCompleted,
            Self::TaskFailed { .. } => DomainEventKind::TaskFailed,
            Self::TaskCanceled { .. } => DomainEventKind::TaskCanceled,
            Self::TaskPaused { .. } => DomainEventKind::TaskPaused,
            Self::TaskResumed { .. } => DomainEventKind::TaskResumed,
            Self::TaskInstructionAdded { .. } => DomainEventKind::TaskInstructionAdded,
            Self::UserInteractionRequested { .. } => DomainEventKind::UserInteractionRequested,
            Self::UserInteractionResponded { .. } => DomainEventKind::UserInteractionResponded,
        }
    }
}

/// An event as persisted by the Event Store: the domain payload plus the
/// ordering and identity metadata the store assigns on append (§3
/// "StoredEvent", §4.1 invariants I1/I2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Globally monotonic across all streams (I1).
    pub id: u64,
    pub stream_id: String,
    /// Monotonic within `stream_id`, starting at 1 (I2).
    pub seq: u64,
    #[serde(flatten)]
    pub event: DomainEvent,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_event_flattens_payload_alongside_envelope() {
        let stored = StoredEvent {
            id: 1,
            stream_id: "task-1".into(),
            seq: 1,
            event: DomainEvent::TaskStarted {
                task_id: "task-1".into(),
                author_actor_id: "agent".into(),
            },
            created_at: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["type"], "task_started");
        assert_eq!(json["seq"], 1);
        let back: StoredEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.event.task_id(), "task-1");
    }

    #[test]
    fn kind_matches_can_transition_tags() {
        let ev = DomainEvent::TaskCompleted {
            task_id: "t".into(),
            summary: None,
            author_actor_id: "a".into(),
        };
        assert_eq!(ev.kind(), DomainEventKind::TaskCompleted);
    }
}
