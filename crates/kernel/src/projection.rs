//! The Task Projection (§4.4): a pure reducer folding the event log into
//! `TasksProjectionState`, checkpointed periodically through the Event
//! Store's projection slot.

use std::collections::HashMap;

use seed_domain::{can_transition, next_status, DomainEvent, Result, StoredEvent, TaskStatus, TaskView};
use seed_eventstore::{EventStore, ProjectionStore};

const PROJECTION_NAME: &str = "tasks";

pub type TasksProjectionState = HashMap<String, TaskView>;

/// Apply one stored event to `state`, per the state machine in §3. Rejected
/// transitions leave state unchanged and never error (§4.4) — the caller
/// (pre-append validation) is where rejection is surfaced to a client.
pub fn apply(state: &mut TasksProjectionState, stored: &StoredEvent) {
    let task_id = stored.event.task_id().to_string();

    if let DomainEvent::TaskCreated {
        title,
        intent,
        priority,
        agent_id,
        parent_task_id,
        ..
    } = &stored.event
    {
        state.entry(task_id.clone()).or_insert_with(|| TaskView {
            task_id: task_id.clone(),
            title: title.clone(),
            intent: intent.clone(),
            priority: *priority,
            agent_id: agent_id.clone(),
            parent_task_id: parent_task_id.clone(),
            child_task_ids: Vec::new(),
            status: TaskStatus::Open,
            pending_interaction_id: None,
            summary: None,
            failure_reason: None,
            created_at: stored.created_at,
            updated_at: stored.created_at,
        });
        if let Some(parent_id) = parent_task_id {
            if let Some(parent) = state.get_mut(parent_id) {
                if !parent.child_task_ids.contains(&task_id) {
                    parent.child_task_ids.push(task_id.clone());
                }
            }
        }
        return;
    }

    let Some(task) = state.get_mut(&task_id) else {
        // Event for a task we haven't seen TaskCreated for yet; ignore.
        return;
    };

    let kind = stored.event.kind();
    if !can_transition(task.status, kind) {
        return;
    }

    match &stored.event {
        DomainEvent::UserInteractionResponded { response, .. } => {
            if task.pending_interaction_id.as_deref() != Some(response.interaction_id.as_str()) {
                // Stale response; ignored at the projection level too (I2).
                return;
            }
            task.pending_interaction_id = None;
        }
        DomainEvent::UserInteractionRequested { request, .. } => {
            task.pending_interaction_id = Some(request.interaction_id.clone());
        }
        DomainEvent::TaskCompleted { summary, .. } => {
            task.summary = summary.clone();
        }
        DomainEvent::TaskFailed { reason, .. } => {
            task.failure_reason = Some(reason.clone());
        }
        _ => {}
    }

    task.status = next_status(task.status, kind);
    task.updated_at = stored.created_at;
}

/// Holds the in-memory projection plus its checkpoint cursor.
pub struct TaskProjection {
    state: TasksProjectionState,
    cursor: u64,
    checkpoint_interval: u64,
}

impl TaskProjection {
    /// Load from the last checkpoint (if any) and replay every event after
    /// it, so a restart only pays for the tail of the log (§4.4).
    pub fn load(
        event_store: &EventStore,
        projection_store: &ProjectionStore,
        checkpoint_interval: u64,
    ) -> Result<Self> {
        let (cursor, state) = projection_store
            .load::<TasksProjectionState>(PROJECTION_NAME)?
            .unwrap_or((0, HashMap::new()));

        let mut projection = Self {
            state,
            cursor,
            checkpoint_interval,
        };
        for stored in event_store.read_all(cursor) {
            projection.apply_one(&stored);
        }
        Ok(projection)
    }

    pub fn apply_one(&mut self, stored: &StoredEvent) {
        apply(&mut self.state, stored);
        self.cursor = stored.id;
    }

    /// Persist a checkpoint if `cursor` has advanced by `checkpoint_interval`
    /// events since the last save. Correctness never depends on this having
    /// run — it is a latency optimization (§4.4).
    pub fn checkpoint_if_due(&self, projection_store: &ProjectionStore, last_checkpoint: u64) -> Result<bool> {
        if self.cursor.saturating_sub(last_checkpoint) < self.checkpoint_interval {
            return Ok(false);
        }
        projection_store.save(PROJECTION_NAME, self.cursor, &self.state)?;
        Ok(true)
    }

    pub fn force_checkpoint(&self, projection_store: &ProjectionStore) -> Result<()> {
        projection_store.save(PROJECTION_NAME, self.cursor, &self.state)
    }

    pub fn get(&self, task_id: &str) -> Option<&TaskView> {
        self.state.get(task_id)
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn list(&self) -> impl Iterator<Item = &TaskView> {
        self.state.values()
    }
}
