use serde::{Deserialize, Serialize};

/// Task priority (§3 "Task").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Foreground,
    Normal,
    Background,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Normal
    }
}

/// Derived task status (§3 "Task state machine").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    AwaitingUser,
    Paused,
    Done,
    Failed,
    Canceled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Canceled)
    }
}

/// The tag of a [`crate::event::DomainEvent`], used by [`can_transition`]
/// without needing the full payload. Kept in lock-step with the variants of
/// `DomainEvent` — see `DomainEvent::kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainEventKind {
    TaskCreated,
    TaskStarted,
    TaskCompleted,
    TaskFailed,
    TaskCanceled,
    TaskPaused,
    TaskResumed,
    TaskInstructionAdded,
    UserInteractionRequested,
    UserInteractionResponded,
}

/// Whether `event` is a legal transition out of `status`.
///
/// This is the **only** place the state machine of §3 is encoded; both the
/// Task Projection reducer and every pre-append validation call this
/// function so they can never drift apart (P4).
///
/// Returning `true` does not imply the status changes — e.g. `TaskStarted`
/// from `InProgress` is an idempotent restart, and `TaskInstructionAdded`
/// from `AwaitingUser` is accepted (persisted) but leaves the task
/// `AwaitingUser` (no silent override, per the open question in §9).
pub fn can_transition(status: TaskStatus, event: DomainEventKind) -> bool {
    use DomainEventKind::*;
    use TaskStatus::*;
    match (status, event) {
        (Open, TaskStarted) => true,
        (Open, TaskCanceled) => true,
        (Open, TaskInstructionAdded) => true,

        (InProgress, TaskStarted) => true, // idempotent restart
        (InProgress, UserInteractionRequested) => true,
        (InProgress, TaskCompleted) => true,
        (InProgress, TaskFailed) => true,
        (InProgress, TaskCanceled) => true,
        (InProgress, TaskPaused) => true,
        (InProgress, TaskInstructionAdded) => true,

        (AwaitingUser, UserInteractionResponded) => true,
        (AwaitingUser, TaskCanceled) => true,
        (AwaitingUser, TaskInstructionAdded) => true, // accepted, status unchanged

        (Paused, TaskFailed) => true,
        (Paused, TaskCanceled) => true,
        (Paused, TaskResumed) => true,
        // Paused explicitly rejects TaskInstructionAdded.

        (Done, TaskStarted) => true,
        (Done, TaskInstructionAdded) => true,

        // Terminal error states reject restart and instructions; to re-run,
        // create a new task.
        (Failed, _) => false,
        (Canceled, _) => false,

        _ => false,
    }
}

/// Compute the next status for an accepted `(status, event)` pair.
///
/// Caller must have already checked [`can_transition`]; this function
/// assumes the transition is legal and panics on an unreachable combination
/// so a drift between the two functions fails loudly in tests rather than
/// silently corrupting a projection.
pub fn next_status(status: TaskStatus, event: DomainEventKind) -> TaskStatus {
    use DomainEventKind::*;
    use TaskStatus::*;
    match (status, event) {
        (Open, TaskStarted) => InProgress,
        (Open, TaskCanceled) => Canceled,
        (Open, TaskInstructionAdded) => InProgress,

        (InProgress, TaskStarted) => InProgress,
        (InProgress, UserInteractionRequested) => AwaitingUser,
        (InProgress, TaskCompleted) => Done,
        (InProgress, TaskFailed) => Failed,
        (InProgress, TaskCanceled) => Canceled,
        (InProgress, TaskPaused) => Paused,
        (InProgress, TaskInstructionAdded) => InProgress,

        (AwaitingUser, UserInteractionResponded) => InProgress,
        (AwaitingUser, TaskCanceled) => Canceled,
        (AwaitingUser, TaskInstructionAdded) => AwaitingUser,

        (Paused, TaskFailed) => Failed,
        (Paused, TaskCanceled) => Canceled,
        (Paused, TaskResumed) => InProgress,

        (Done, TaskStarted) => InProgress,
        (Done, TaskInstructionAdded) => InProgress,

        (from, event) => unreachable!(
            "next_status called on a combination can_transition should have rejected: \
             {from:?} + {event:?}"
        ),
    }
}

/// The `TaskView` read model (§3 "Task").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskView {
    pub task_id: String,
    pub title: String,
    pub intent: String,
    pub priority: TaskPriority,
    pub agent_id: Option<String>,
    pub parent_task_id: Option<String>,
    #[serde(default)]
    pub child_task_ids: Vec<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub pending_interaction_id: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        assert!(can_transition(TaskStatus::Open, DomainEventKind::TaskStarted));
        assert_eq!(
            next_status(TaskStatus::Open, DomainEventKind::TaskStarted),
            TaskStatus::InProgress
        );
        assert!(can_transition(
            TaskStatus::InProgress,
            DomainEventKind::TaskCompleted
        ));
        assert_eq!(
            next_status(TaskStatus::InProgress, DomainEventKind::TaskCompleted),
            TaskStatus::Done
        );
    }

    #[test]
    fn paused_rejects_instruction() {
        assert!(!can_transition(
            TaskStatus::Paused,
            DomainEventKind::TaskInstructionAdded
        ));
    }

    #[test]
    fn awaiting_user_accepts_instruction_without_status_change() {
        assert!(can_transition(
            TaskStatus::AwaitingUser,
            DomainEventKind::TaskInstructionAdded
        ));
        assert_eq!(
            next_status(TaskStatus::AwaitingUser, DomainEventKind::TaskInstructionAdded),
            TaskStatus::AwaitingUser
        );
    }

    #[test]
    fn terminal_states_reject_restart_and_instructions() {
        for status in [TaskStatus::Failed, TaskStatus::Canceled] {
            assert!(!can_transition(status, DomainEventKind::TaskStarted));
            assert!(!can_transition(status, DomainEventKind::TaskInstructionAdded));
        }
    }

    #[test]
    fn done_allows_explicit_restart() {
        assert!(can_transition(TaskStatus::Done, DomainEventKind::TaskStarted));
        assert_eq!(
            next_status(TaskStatus::Done, DomainEventKind::TaskStarted),
            TaskStatus::InProgress
        );
    }

    #[test]
    fn in_progress_restart_is_idempotent() {
        assert_eq!(
            next_status(TaskStatus::InProgress, DomainEventKind::TaskStarted),
            TaskStatus::InProgress
        );
    }
}
