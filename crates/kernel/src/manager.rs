//! The Runtime Manager (§4.9): the single `events$` subscriber that owns
//! every `AgentRuntime` and routes each appended event to the right one.
//! Task-affine serialization (I5) comes from holding a per-task async
//! mutex for the duration of any routed call that touches that task's
//! runtime; pure signaling routes (`pause`, `cancel`) skip the lock
//! entirely since they only flip an atomic.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use seed_agents::LlmClient;
use seed_audit::AuditLog;
use seed_conversation::ConversationStore;
use seed_domain::{can_transition, next_status, DomainEvent, StoredEvent, TaskStatus};
use seed_eventstore::EventStore;
use seed_tools::ToolRegistry;

use crate::registry::AgentRegistry;
use crate::runtime::{AgentRuntime, RuntimeDeps};
use crate::ui::UiBus;

const DEFAULT_PROFILE: &str = "default";
const WILDCARD: &str = "*";

pub struct RuntimeManager {
    event_store: Arc<EventStore>,
    conversation: Arc<ConversationStore>,
    audit: Arc<AuditLog>,
    tools: Arc<ToolRegistry>,
    agents: Arc<AgentRegistry>,
    ui: Arc<UiBus>,
    llm_profiles: HashMap<String, Arc<dyn LlmClient>>,
    work_dir: PathBuf,
    max_tool_loops: u32,

    runtimes: SyncMutex<HashMap<String, Arc<AgentRuntime>>>,
    locks: SyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    statuses: SyncMutex<HashMap<String, TaskStatus>>,
    profile_overrides: SyncMutex<HashMap<String, String>>,
    streaming_overrides: SyncMutex<HashMap<String, bool>>,
    default_streaming: AtomicBool,
    last_id: AtomicU64,
    inflight: Arc<AtomicUsize>,
}

impl RuntimeManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_store: Arc<EventStore>,
        conversation: Arc<ConversationStore>,
        audit: Arc<AuditLog>,
        tools: Arc<ToolRegistry>,
        agents: Arc<AgentRegistry>,
        ui: Arc<UiBus>,
        llm_profiles: HashMap<String, Arc<dyn LlmClient>>,
        work_dir: PathBuf,
        max_tool_loops: u32,
        default_streaming: bool,
    ) -> Self {
        Self {
            event_store,
            conversation,
            audit,
            tools,
            agents,
            ui,
            llm_profiles,
            work_dir,
            max_tool_loops,
            runtimes: SyncMutex::new(HashMap::new()),
            locks: SyncMutex::new(HashMap::new()),
            statuses: SyncMutex::new(HashMap::new()),
            profile_overrides: SyncMutex::new(HashMap::new()),
            streaming_overrides: SyncMutex::new(HashMap::new()),
            default_streaming: AtomicBool::new(default_streaming),
            last_id: AtomicU64::new(0),
            inflight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replay any events already in the log (a restart) to rebuild task
    /// status tracking, then start the live router. Tasks that were left
    /// mid-flight by a prior process are not automatically re-attached to
    /// a fresh `AgentRuntime` here — reconciling in-flight work across a
    /// crash is out of scope; the next event routed for such a task (a
    /// resume, an instruction, a cancel) will lazily find no runtime and
    /// be dropped with a warning. Must be called at most once per manager.
    pub fn spawn_router(self: &Arc<Self>) -> JoinHandle<()> {
        // Subscribe before the bootstrap replay so an event appended
        // concurrently with `read_all` is never lost between the two reads
        // — it lands in the channel buffer and is simply de-duplicated
        // against the bootstrap cursor below.
        let mut rx = self.event_store.subscribe();
        for stored in self.event_store.read_all(0) {
            self.track_status(&stored);
            self.last_id.store(stored.id, Ordering::SeqCst);
        }
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(stored) => {
                        if stored.id <= manager.last_id.load(Ordering::SeqCst) {
                            continue;
                        }
                        manager.last_id.store(stored.id, Ordering::SeqCst);
                        manager.route(stored).await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "runtime manager lagged behind events$; reconciling from read_all");
                        let cursor = manager.last_id.load(Ordering::SeqCst);
                        for stored in manager.event_store.read_all(cursor) {
                            manager.last_id.store(stored.id, Ordering::SeqCst);
                            manager.route(stored).await;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub fn set_profile_override(&self, task_id_or_wildcard: impl Into<String>, profile: impl Into<String>) {
        self.profile_overrides.lock().insert(task_id_or_wildcard.into(), profile.into());
    }

    pub fn set_streaming_override(&self, task_id_or_wildcard: impl Into<String>, enabled: bool) {
        let key = task_id_or_wildcard.into();
        if key == WILDCARD {
            self.default_streaming.store(enabled, Ordering::SeqCst);
            for runtime in self.runtimes.lock().values() {
                runtime.set_streaming(enabled);
            }
            return;
        }
        if let Some(runtime) = self.runtimes.lock().get(&key) {
            runtime.set_streaming(enabled);
        }
        self.streaming_overrides.lock().insert(key, enabled);
    }

    pub fn set_global_streaming(&self, enabled: bool) {
        self.default_streaming.store(enabled, Ordering::SeqCst);
        for runtime in self.runtimes.lock().values() {
            runtime.set_streaming(enabled);
        }
    }

    /// Busy-poll until the router has caught up with every event appended
    /// so far and no routed task is mid-execution. Testing-only — a
    /// snapshot of "idle", not a guarantee against a concurrent new event.
    pub async fn wait_for_idle(&self) {
        loop {
            let caught_up = self.last_id.load(Ordering::SeqCst) >= self.event_store.latest_id();
            if caught_up && self.inflight.load(Ordering::SeqCst) == 0 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }

    fn lock_for(&self, task_id: &str) -> Arc<AsyncMutex<()>> {
        Arc::clone(
            self.locks
                .lock()
                .entry(task_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    fn resolve_llm(&self, task_id: &str, agent_default_profile: Option<&str>) -> Arc<dyn LlmClient> {
        let overrides = self.profile_overrides.lock();
        let profile = overrides
            .get(task_id)
            .or_else(|| overrides.get(WILDCARD))
            .cloned()
            .or_else(|| agent_default_profile.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
        self.llm_profiles
            .get(&profile)
            .or_else(|| self.llm_profiles.get(DEFAULT_PROFILE))
            .cloned()
            .expect("at least a \"default\" LLM profile must be registered")
    }

    fn resolve_streaming(&self, task_id: &str) -> bool {
        self.streaming_overrides
            .lock()
            .get(task_id)
            .copied()
            .unwrap_or_else(|| self.default_streaming.load(Ordering::SeqCst))
    }

    fn track_status(&self, stored: &StoredEvent) {
        let task_id = stored.event.task_id().to_string();
        let mut statuses = self.statuses.lock();
        if let DomainEvent::TaskCreated { .. } = &stored.event {
            statuses.entry(task_id).or_insert(TaskStatus::Open);
            return;
        }
        let kind = stored.event.kind();
        if let Some(status) = statuses.get_mut(&task_id) {
            if can_transition(*status, kind) {
                *status = next_status(*status, kind);
            }
        }
    }

    /// Recovers the agent a task was created with by scanning its stream for
    /// `TaskCreated`, so a runtime can be rebuilt for a task whose original
    /// runtime was already torn down (the task reached a terminal status).
    fn agent_id_for(&self, task_id: &str) -> Option<String> {
        self.event_store.read_stream(task_id, 0).into_iter().find_map(|stored| match stored.event {
            DomainEvent::TaskCreated { agent_id, .. } => agent_id,
            _ => None,
        })
    }

    fn create_runtime(&self, task_id: &str, agent_id: &str) -> Option<Arc<AgentRuntime>> {
        let Some(agent) = self.agents.get(agent_id) else {
            tracing::warn!(task_id, agent_id, "task created for an unregistered agent; ignoring");
            return None;
        };
        let llm = self.resolve_llm(task_id, agent.default_profile());
        let streaming = self.resolve_streaming(task_id);
        let deps = Arc::new(RuntimeDeps {
            event_store: Arc::clone(&self.event_store),
            conversation: Arc::clone(&self.conversation),
            audit: Arc::clone(&self.audit),
            tools: Arc::clone(&self.tools),
            ui: Arc::clone(&self.ui),
            max_tool_loops: self.max_tool_loops,
        });
        let runtime = Arc::new(AgentRuntime::new(
            task_id.to_string(),
            agent,
            llm,
            self.work_dir.join(task_id),
            deps,
            streaming,
        ));
        self.runtimes.lock().insert(task_id.to_string(), runtime.clone());
        Some(runtime)
    }

    fn runtime_for(&self, task_id: &str) -> Option<Arc<AgentRuntime>> {
        self.runtimes.lock().get(task_id).cloned()
    }

    fn drop_runtime(&self, task_id: &str) {
        self.runtimes.lock().remove(task_id);
        self.locks.lock().remove(task_id);
    }

    /// The routing table of §4.9, dispatched from the single `events$`
    /// consumer loop.
    async fn route(self: &Arc<Self>, stored: StoredEvent) {
        self.track_status(&stored);
        let task_id = stored.event.task_id().to_string();

        match &stored.event {
            DomainEvent::TaskCreated { agent_id, .. } => {
                let Some(agent_id) = agent_id.clone() else {
                    return;
                };
                if self.create_runtime(&task_id, &agent_id).is_some() {
                    self.run_locked(&task_id, |runtime| async move { runtime.execute().await });
                }
            }
            DomainEvent::UserInteractionResponded { response, .. } => {
                if self.runtime_for(&task_id).is_none() {
                    return;
                }
                // `InteractionService::respond_to_interaction` already rejected
                // stale responses before this event was ever appended (I2); here
                // we only need to recover which request it answered.
                let Some(request) = self
                    .event_store
                    .read_stream(&task_id, 0)
                    .into_iter()
                    .find_map(|stored| match stored.event {
                        DomainEvent::UserInteractionRequested { request, .. }
                            if request.interaction_id == response.interaction_id =>
                        {
                            Some(request)
                        }
                        _ => None,
                    })
                else {
                    tracing::warn!(task_id, "no matching interaction request found for response; dropping");
                    return;
                };
                let response = response.clone();
                self.run_locked(&task_id, move |runtime| async move { runtime.resume(&request, response).await });
            }
            DomainEvent::TaskResumed { .. } => {
                self.run_locked(&task_id, |runtime| async move { runtime.resume_from_pause().await });
            }
            DomainEvent::TaskInstructionAdded { message, .. } => {
                let message = message.clone();
                let was_done = self.statuses.lock().get(&task_id).copied() == Some(TaskStatus::Done);
                let runtime = match self.runtime_for(&task_id) {
                    Some(r) => r,
                    None => {
                        // The task already reached a terminal status and its
                        // runtime was torn down; rebuild one the same way
                        // `TaskCreated` does so the instruction can still
                        // reopen and re-drain the task.
                        let Some(agent_id) = self.agent_id_for(&task_id) else {
                            tracing::warn!(task_id, "instruction added to a task with no recorded agent; dropping");
                            return;
                        };
                        match self.create_runtime(&task_id, &agent_id) {
                            Some(r) => r,
                            None => return,
                        }
                    }
                };
                if let Err(e) = runtime.record_instruction(message) {
                    tracing::error!(task_id, error = %e, "failed to persist instruction");
                    return;
                }
                let status = self.statuses.lock().get(&task_id).copied();
                if was_done || status == Some(TaskStatus::InProgress) {
                    self.run_locked(&task_id, |runtime| async move { runtime.continue_drain().await });
                }
            }
            DomainEvent::TaskPaused { .. } => {
                if let Some(runtime) = self.runtime_for(&task_id) {
                    runtime.request_pause();
                }
            }
            DomainEvent::TaskCanceled { .. } => {
                if let Some(runtime) = self.runtime_for(&task_id) {
                    runtime.cancel();
                }
                self.drop_runtime(&task_id);
            }
            DomainEvent::TaskCompleted { .. } | DomainEvent::TaskFailed { .. } => {
                self.drop_runtime(&task_id);
            }
            DomainEvent::TaskStarted { .. } | DomainEvent::UserInteractionRequested { .. } => {}
        }
    }

    /// Run `f(runtime)` under the task's per-task async lock, tracked by
    /// `inflight` for `wait_for_idle`. Fire-and-forget: the router loop
    /// does not block on task execution, so a slow agent never starves
    /// other tasks' routing.
    fn run_locked<F, Fut>(self: &Arc<Self>, task_id: &str, f: F)
    where
        F: FnOnce(Arc<AgentRuntime>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = seed_domain::Result<crate::runtime::RuntimeOutcome>> + Send,
    {
        let Some(runtime) = self.runtime_for(task_id) else { return };
        let lock = self.lock_for(task_id);
        let inflight = Arc::clone(&self.inflight);
        let task_id = task_id.to_string();
        inflight.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            let _guard = lock.lock().await;
            if let Err(e) = f(runtime).await {
                tracing::error!(task_id, error = %e, "agent runtime execution failed");
            }
            inflight.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seed_agents::{ChatAgent, FakeLlmClient};
    use seed_domain::{InteractionResponse, TaskPriority};

    fn manager(dir: &std::path::Path, llm: Arc<dyn LlmClient>) -> (Arc<RuntimeManager>, Arc<EventStore>) {
        let event_store = Arc::new(EventStore::open(dir.join("events")).unwrap());
        let conversation = Arc::new(ConversationStore::open(dir.join("conversations")).unwrap());
        let audit = Arc::new(AuditLog::open(dir.join("audit")).unwrap());
        let tools = Arc::new(ToolRegistry::new());
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(ChatAgent::new("agent_seed_chat")));
        let mut profiles: HashMap<String, Arc<dyn LlmClient>> = HashMap::new();
        profiles.insert(DEFAULT_PROFILE.to_string(), llm);

        let manager = Arc::new(RuntimeManager::new(
            Arc::clone(&event_store),
            conversation,
            audit,
            tools,
            Arc::new(registry),
            Arc::new(UiBus::new()),
            profiles,
            dir.join("work"),
            40,
            false,
        ));
        manager.spawn_router();
        (manager, event_store)
    }

    #[tokio::test]
    async fn task_created_spins_up_a_runtime_and_runs_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, event_store) = manager(dir.path(), Arc::new(FakeLlmClient::with_text("done")));

        event_store
            .append_one(DomainEvent::TaskCreated {
                task_id: "task_a".into(),
                title: "t".into(),
                intent: "i".into(),
                priority: TaskPriority::Normal,
                agent_id: Some("agent_seed_chat".into()),
                parent_task_id: None,
                author_actor_id: "user".into(),
            })
            .unwrap();

        manager.wait_for_idle().await;

        assert!(event_store
            .read_stream("task_a", 0)
            .iter()
            .any(|s| matches!(s.event, DomainEvent::TaskCompleted { .. })));
        assert!(manager.runtime_for("task_a").is_none());
    }

    #[tokio::test]
    async fn task_created_for_unregistered_agent_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, event_store) = manager(dir.path(), Arc::new(FakeLlmClient::with_text("done")));

        event_store
            .append_one(DomainEvent::TaskCreated {
                task_id: "task_b".into(),
                title: "t".into(),
                intent: "i".into(),
                priority: TaskPriority::Normal,
                agent_id: Some("no_such_agent".into()),
                parent_task_id: None,
                author_actor_id: "user".into(),
            })
            .unwrap();

        manager.wait_for_idle().await;
        assert!(manager.runtime_for("task_b").is_none());
    }

    #[tokio::test]
    async fn stale_interaction_response_is_dropped_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, event_store) = manager(dir.path(), Arc::new(FakeLlmClient::with_text("done")));

        event_store
            .append_one(DomainEvent::TaskCreated {
                task_id: "task_c".into(),
                title: "t".into(),
                intent: "i".into(),
                priority: TaskPriority::Normal,
                agent_id: Some("agent_seed_chat".into()),
                parent_task_id: None,
                author_actor_id: "user".into(),
            })
            .unwrap();
        manager.wait_for_idle().await;

        event_store
            .append_one(DomainEvent::UserInteractionResponded {
                task_id: "task_c".into(),
                response: InteractionResponse {
                    interaction_id: "ui_never_requested".into(),
                    selected_option_id: Some("approve".into()),
                    text: None,
                    composite: None,
                },
                author_actor_id: "user".into(),
            })
            .unwrap();

        manager.wait_for_idle().await;
    }

    #[tokio::test]
    async fn instruction_on_a_done_task_resumes_the_drain() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, event_store) = manager(dir.path(), Arc::new(FakeLlmClient::with_text("still here")));

        event_store
            .append_one(DomainEvent::TaskCreated {
                task_id: "task_d".into(),
                title: "t".into(),
                intent: "i".into(),
                priority: TaskPriority::Normal,
                agent_id: Some("agent_seed_chat".into()),
                parent_task_id: None,
                author_actor_id: "user".into(),
            })
            .unwrap();
        manager.wait_for_idle().await;
        assert!(manager.runtime_for("task_d").is_none());

        event_store
            .append_one(DomainEvent::TaskInstructionAdded {
                task_id: "task_d".into(),
                message: seed_domain::LlmMessage::user("one more thing"),
                author_actor_id: "user".into(),
            })
            .unwrap();
        manager.wait_for_idle().await;

        let events = event_store.read_stream("task_d", 0);
        assert_eq!(events.iter().filter(|s| matches!(s.event, DomainEvent::TaskCompleted { .. })).count(), 2);
    }
}

