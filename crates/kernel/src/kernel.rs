//! The top-level facade (§5): wires the Event Store, Conversation Store,
//! Audit Log, Tool Registry, Agent Registry, Task Projection, Runtime
//! Manager and `ui$` bus into one handle. Everything outside this crate
//! (HTTP routes, a CLI) talks to the kernel only through this surface.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use seed_agents::LlmClient;
use seed_audit::AuditLog;
use seed_conversation::ConversationStore;
use seed_domain::{
    can_transition, DomainEvent, DomainEventKind, Error, InteractionRequest, InteractionResponse,
    LlmMessage, Result, StoredEvent, TaskPriority, TaskView,
};
use seed_eventstore::{EventStore, ProjectionStore};
use seed_tools::ToolRegistry;

use crate::interaction::InteractionService;
use crate::manager::RuntimeManager;
use crate::projection::TaskProjection;
use crate::registry::AgentRegistry;
use crate::ui::UiBus;

/// Bootstrap knobs that don't belong to any one crate's store.
pub struct KernelConfig {
    pub work_dir: PathBuf,
    pub max_tool_loops: u32,
    pub default_streaming: bool,
    pub projection_checkpoint_interval: u64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("data/work"),
            max_tool_loops: 40,
            default_streaming: true,
            projection_checkpoint_interval: 50,
        }
    }
}

pub struct Kernel {
    pub event_store: Arc<EventStore>,
    pub conversation: Arc<ConversationStore>,
    pub audit: Arc<AuditLog>,
    pub tools: Arc<ToolRegistry>,
    pub agents: Arc<AgentRegistry>,
    pub ui: Arc<UiBus>,
    pub manager: Arc<RuntimeManager>,

    projection_store: Arc<ProjectionStore>,
    projection: SyncMutex<TaskProjection>,
    projection_interval: u64,
    last_checkpoint: AtomicU64,
    /// Subscribed in [`Kernel::open`], before the bootstrap replay, so no
    /// event appended between construction and [`Kernel::start`] is ever
    /// lost; consumed the first (and only) time `start` runs.
    projection_rx: SyncMutex<Option<broadcast::Receiver<StoredEvent>>>,
}

impl Kernel {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        data_dir: impl AsRef<Path>,
        tools: Arc<ToolRegistry>,
        agents: Arc<AgentRegistry>,
        llm_profiles: HashMap<String, Arc<dyn LlmClient>>,
        config: KernelConfig,
    ) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let event_store = Arc::new(EventStore::open(data_dir.join("events"))?);
        let conversation = Arc::new(ConversationStore::open(data_dir.join("conversations"))?);
        let audit = Arc::new(AuditLog::open(data_dir.join("audit"))?);
        let projection_store = Arc::new(ProjectionStore::open(data_dir.join("projections"))?);
        let ui = Arc::new(UiBus::new());

        // Subscribe before replaying so nothing appended concurrently with
        // `TaskProjection::load`'s `read_all` is missed; `observe` skips
        // anything at or before the replay's cursor once `start` consumes
        // this receiver.
        let projection_rx = event_store.subscribe();
        let projection = TaskProjection::load(&event_store, &projection_store, config.projection_checkpoint_interval)?;
        let cursor = projection.cursor();

        let manager = Arc::new(RuntimeManager::new(
            Arc::clone(&event_store),
            Arc::clone(&conversation),
            Arc::clone(&audit),
            Arc::clone(&tools),
            Arc::clone(&agents),
            Arc::clone(&ui),
            llm_profiles,
            config.work_dir,
            config.max_tool_loops,
            config.default_streaming,
        ));

        Ok(Self {
            event_store,
            conversation,
            audit,
            tools,
            agents,
            ui,
            manager,
            projection_store,
            projection: SyncMutex::new(projection),
            projection_interval: config.projection_checkpoint_interval,
            last_checkpoint: AtomicU64::new(cursor),
            projection_rx: SyncMutex::new(Some(projection_rx)),
        })
    }

    /// Start the Runtime Manager's router and this kernel's own projection
    /// updater, both fed from `events$`. Must be called at most once —
    /// the second call finds no stashed receiver and panics.
    pub fn start(self: &Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        let router = self.manager.spawn_router();

        let kernel = Arc::clone(self);
        let mut rx = self
            .projection_rx
            .lock()
            .take()
            .expect("Kernel::start called more than once");
        let projector = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(stored) => {
                        if stored.id > kernel.projection.lock().cursor() {
                            kernel.observe(&stored);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        let cursor = kernel.projection.lock().cursor();
                        for stored in kernel.event_store.read_all(cursor) {
                            kernel.observe(&stored);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        (router, projector)
    }

    fn observe(&self, stored: &StoredEvent) {
        let mut projection = self.projection.lock();
        projection.apply_one(stored);
        let last = self.last_checkpoint.load(Ordering::SeqCst);
        if projection
            .checkpoint_if_due(&self.projection_store, last)
            .unwrap_or(false)
        {
            self.last_checkpoint.store(projection.cursor(), Ordering::SeqCst);
        }
    }

    pub fn interactions(&self) -> InteractionService<'_> {
        InteractionService::new(&self.event_store)
    }

    pub fn get_task(&self, task_id: &str) -> Option<TaskView> {
        self.projection.lock().get(task_id).cloned()
    }

    pub fn list_tasks(&self) -> Vec<TaskView> {
        self.projection.lock().list().cloned().collect()
    }

    pub fn events_after(&self, after_id: u64) -> Vec<StoredEvent> {
        self.event_store.read_all(after_id)
    }

    pub fn events_for_task(&self, task_id: &str, from_seq: u64) -> Vec<StoredEvent> {
        self.event_store.read_stream(task_id, from_seq)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<StoredEvent> {
        self.event_store.subscribe()
    }

    pub fn subscribe_ui(&self) -> broadcast::Receiver<crate::ui::UiEnvelope> {
        self.ui.subscribe()
    }

    /// Create a task and append `TaskCreated`. The Runtime Manager picks
    /// this up off `events$` and starts the agent on its own; this call
    /// returns as soon as the event is durable.
    pub fn create_task(
        &self,
        title: impl Into<String>,
        intent: impl Into<String>,
        priority: TaskPriority,
        agent_id: Option<String>,
        parent_task_id: Option<String>,
        author_actor_id: &str,
    ) -> Result<String> {
        if let Some(agent_id) = &agent_id {
            if self.agents.get(agent_id).is_none() {
                return Err(Error::AgentNotFound(agent_id.clone()));
            }
        }
        let task_id = format!("task_{}", uuid::Uuid::new_v4());
        self.event_store.append_one(DomainEvent::TaskCreated {
            task_id: task_id.clone(),
            title: title.into(),
            intent: intent.into(),
            priority,
            agent_id,
            parent_task_id,
            author_actor_id: author_actor_id.to_string(),
        })?;
        Ok(task_id)
    }

    pub fn pause_task(&self, task_id: &str, reason: Option<String>, author_actor_id: &str) -> Result<()> {
        self.ensure_transition(task_id, DomainEventKind::TaskPaused)?;
        self.event_store.append_one(DomainEvent::TaskPaused {
            task_id: task_id.to_string(),
            reason,
            author_actor_id: author_actor_id.to_string(),
        })?;
        Ok(())
    }

    pub fn resume_task(&self, task_id: &str, author_actor_id: &str) -> Result<()> {
        self.ensure_transition(task_id, DomainEventKind::TaskResumed)?;
        self.event_store.append_one(DomainEvent::TaskResumed {
            task_id: task_id.to_string(),
            author_actor_id: author_actor_id.to_string(),
        })?;
        Ok(())
    }

    pub fn cancel_task(&self, task_id: &str, reason: Option<String>, author_actor_id: &str) -> Result<()> {
        self.ensure_transition(task_id, DomainEventKind::TaskCanceled)?;
        self.event_store.append_one(DomainEvent::TaskCanceled {
            task_id: task_id.to_string(),
            reason,
            author_actor_id: author_actor_id.to_string(),
        })?;
        Ok(())
    }

    pub fn add_instruction(&self, task_id: &str, text: impl Into<String>, author_actor_id: &str) -> Result<()> {
        self.ensure_transition(task_id, DomainEventKind::TaskInstructionAdded)?;
        self.event_store.append_one(DomainEvent::TaskInstructionAdded {
            task_id: task_id.to_string(),
            message: LlmMessage::user(text),
            author_actor_id: author_actor_id.to_string(),
        })?;
        Ok(())
    }

    pub fn respond_interaction(
        &self,
        task_id: &str,
        response: InteractionResponse,
        author_actor_id: &str,
    ) -> Result<InteractionRequest> {
        self.interactions().respond_to_interaction(task_id, response, author_actor_id)
    }

    fn ensure_transition(&self, task_id: &str, kind: DomainEventKind) -> Result<()> {
        let status = self
            .projection
            .lock()
            .get(task_id)
            .map(|t| t.status)
            .ok_or_else(|| Error::Other(format!("unknown task {task_id}")))?;
        if !can_transition(status, kind) {
            return Err(Error::InvalidTransition { from: format!("{status:?}"), event: format!("{kind:?}") });
        }
        Ok(())
    }
}
