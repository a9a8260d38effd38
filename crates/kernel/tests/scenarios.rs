//! End-to-end scenarios driven through the `Kernel` facade, one per
//! spec.md §8 "Scenarios" entry. These exercise the full stack (Event
//! Store, Runtime Manager, Agent Runtime, Output Handler) the way a real
//! client would, as opposed to the unit tests living alongside each
//! component.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use seed_agents::{Agent, ChatAgent, FakeLlmClient, LlmClient, LlmCompletion};
use seed_domain::{DomainEvent, InteractionResponse, LlmMessage, Result, TaskPriority, TaskStatus, ToolCallRequest, ToolDefinition};
use seed_kernel::{AgentRegistry, Kernel, KernelConfig};
use seed_tools::builtin::shell_exec::ShellExecTool;
use seed_tools::ToolRegistry;

fn kernel(
    dir: &std::path::Path,
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
) -> Arc<Kernel> {
    let mut agents = AgentRegistry::new();
    agents.register(Arc::new(ChatAgent::new("agent_seed_chat")));
    let mut profiles: HashMap<String, Arc<dyn LlmClient>> = HashMap::new();
    profiles.insert("default".into(), llm);
    let config = KernelConfig { work_dir: dir.join("work"), ..KernelConfig::default() };
    Arc::new(Kernel::open(dir, Arc::new(tools), Arc::new(agents), profiles, config).unwrap())
}

async fn poll_until<F: Fn() -> bool>(pred: F, timeout: std::time::Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if pred() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    pred()
}

/// An `LlmClient` whose first call blocks on a `Notify` until the test
/// releases it, so a test can observe a drain loop mid-flight.
struct DeferredLlmClient {
    release: Arc<Notify>,
    released: AtomicBool,
    completion: LlmCompletion,
}

impl DeferredLlmClient {
    fn new(release: Arc<Notify>, text: impl Into<String>) -> Self {
        Self {
            release,
            released: AtomicBool::new(false),
            completion: LlmCompletion { content: Some(text.into()), stop_reason: "end_turn".into(), ..Default::default() },
        }
    }
}

#[async_trait]
impl LlmClient for DeferredLlmClient {
    async fn complete(&self, _messages: &[LlmMessage], _tools: &[ToolDefinition]) -> Result<LlmCompletion> {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.release.notified().await;
        }
        Ok(self.completion.clone())
    }
}

// Scenario 1: happy path.
#[tokio::test]
async fn happy_path_reaches_done_with_expected_event_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let kernel = kernel(dir.path(), Arc::new(FakeLlmClient::with_text("Hello")), ToolRegistry::new());
    let (_router, _projector) = kernel.start();

    let task_id = kernel
        .create_task("T1", "say hello", TaskPriority::Normal, Some("agent_seed_chat".into()), None, "user")
        .unwrap();
    kernel.conversation.append(&task_id, LlmMessage::user("hi")).unwrap();
    kernel.manager.wait_for_idle().await;

    let view = kernel.get_task(&task_id).unwrap();
    assert_eq!(view.status, TaskStatus::Done);

    let kinds: Vec<_> = kernel
        .events_for_task(&task_id, 0)
        .into_iter()
        .map(|s| s.event.kind())
        .collect();
    assert_eq!(
        kinds,
        vec![
            seed_domain::DomainEventKind::TaskCreated,
            seed_domain::DomainEventKind::TaskStarted,
            seed_domain::DomainEventKind::TaskCompleted,
        ]
    );

    let history = kernel.conversation.get_messages(&task_id).unwrap();
    let last = history.last().unwrap();
    assert!(last.is_assistant());
}

// Scenario 2: pause mid-execution.
#[tokio::test]
async fn pause_mid_execution_holds_status_through_a_racing_completion() {
    let dir = tempfile::tempdir().unwrap();
    let release = Arc::new(Notify::new());
    let kernel = kernel(dir.path(), Arc::new(DeferredLlmClient::new(Arc::clone(&release), "done")), ToolRegistry::new());
    let (_router, _projector) = kernel.start();

    let task_id = kernel
        .create_task("T2", "slow work", TaskPriority::Normal, Some("agent_seed_chat".into()), None, "user")
        .unwrap();
    kernel.conversation.append(&task_id, LlmMessage::user("hi")).unwrap();

    let started = poll_until(
        || {
            kernel
                .events_for_task(&task_id, 0)
                .iter()
                .any(|s| matches!(s.event, DomainEvent::TaskStarted { .. }))
        },
        std::time::Duration::from_secs(2),
    )
    .await;
    assert!(started, "TaskStarted was never observed");

    poll_until(|| kernel.get_task(&task_id).map(|v| v.status) == Some(TaskStatus::InProgress), std::time::Duration::from_secs(2)).await;

    kernel.pause_task(&task_id, Some("operator requested".into()), "user").unwrap();
    poll_until(|| kernel.get_task(&task_id).map(|v| v.status) == Some(TaskStatus::Paused), std::time::Duration::from_secs(2)).await;
    assert_eq!(kernel.get_task(&task_id).unwrap().status, TaskStatus::Paused);

    // Release the in-flight completion. It still appends `TaskCompleted`
    // (the drain loop only checks the cooperative pause flag between
    // iterations, not mid-call) but the projection rejects the
    // paused -> done transition (can_transition), so status stays paused.
    release.notify_one();
    poll_until(
        || {
            kernel
                .events_for_task(&task_id, 0)
                .iter()
                .any(|s| matches!(s.event, DomainEvent::TaskCompleted { .. }))
        },
        std::time::Duration::from_secs(2),
    )
    .await;

    assert_eq!(kernel.get_task(&task_id).unwrap().status, TaskStatus::Paused);
}

// Scenario 3: stale UIP response.
#[tokio::test]
async fn stale_interaction_response_is_dropped_and_the_real_one_still_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(ShellExecTool));
    let llm = Arc::new(FakeLlmClient::with_tool_call("c1", "shell_exec", serde_json::json!({"command": "echo hi"})));
    let kernel = kernel(dir.path(), llm, tools);
    let (_router, _projector) = kernel.start();

    let task_id = kernel
        .create_task("T3", "run a command", TaskPriority::Normal, Some("agent_seed_chat".into()), None, "user")
        .unwrap();
    kernel.conversation.append(&task_id, LlmMessage::user("run echo hi")).unwrap();
    kernel.manager.wait_for_idle().await;

    assert_eq!(kernel.get_task(&task_id).unwrap().status, TaskStatus::AwaitingUser);
    let pending = kernel.get_task(&task_id).unwrap().pending_interaction_id.unwrap();

    // A response naming a request that was never made.
    kernel
        .event_store
        .append_one(DomainEvent::UserInteractionResponded {
            task_id: task_id.clone(),
            response: InteractionResponse {
                interaction_id: "ui_never_requested".into(),
                selected_option_id: Some("approve".into()),
                text: None,
                composite: None,
            },
            author_actor_id: "user".into(),
        })
        .unwrap();
    kernel.manager.wait_for_idle().await;

    // Stale response did nothing: still awaiting the original interaction.
    assert_eq!(kernel.get_task(&task_id).unwrap().status, TaskStatus::AwaitingUser);
    assert_eq!(kernel.get_task(&task_id).unwrap().pending_interaction_id, Some(pending.clone()));

    // The real response resumes normally.
    kernel
        .respond_interaction(
            &task_id,
            InteractionResponse { interaction_id: pending, selected_option_id: Some("approve".into()), text: None, composite: None },
            "user",
        )
        .unwrap();
    kernel.manager.wait_for_idle().await;
    assert_eq!(kernel.get_task(&task_id).unwrap().status, TaskStatus::Done);
}

// Scenario 4: risky tool, reject one of a batch.
#[tokio::test]
async fn rejecting_one_risky_call_in_a_batch_leaves_the_other_pending() {
    let dir = tempfile::tempdir().unwrap();
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(ShellExecTool));
    let completion = LlmCompletion {
        tool_calls: vec![
            ToolCallRequest { tool_call_id: "call_1".into(), tool_name: "shell_exec".into(), arguments: serde_json::json!({"command": "echo one"}) },
            ToolCallRequest { tool_call_id: "call_2".into(), tool_name: "shell_exec".into(), arguments: serde_json::json!({"command": "echo two"}) },
        ],
        stop_reason: "tool_use".into(),
        ..Default::default()
    };
    let llm = Arc::new(FakeLlmClient::new(vec![completion]));
    let kernel = kernel(dir.path(), llm, tools);
    let (_router, _projector) = kernel.start();

    let task_id = kernel
        .create_task("T4", "run two commands", TaskPriority::Normal, Some("agent_seed_chat".into()), None, "user")
        .unwrap();
    kernel.conversation.append(&task_id, LlmMessage::user("run both")).unwrap();
    kernel.manager.wait_for_idle().await;

    assert_eq!(kernel.get_task(&task_id).unwrap().status, TaskStatus::AwaitingUser);
    let first_request = kernel
        .events_for_task(&task_id, 0)
        .into_iter()
        .find_map(|s| match s.event {
            DomainEvent::UserInteractionRequested { request, .. } => Some(request),
            _ => None,
        })
        .unwrap();
    assert_eq!(first_request.display.tool_call_id(), Some("call_1"));

    kernel
        .respond_interaction(
            &task_id,
            InteractionResponse {
                interaction_id: first_request.interaction_id.clone(),
                selected_option_id: Some("reject".into()),
                text: None,
                composite: None,
            },
            "user",
        )
        .unwrap();
    kernel.manager.wait_for_idle().await;

    // A fresh Confirm bound to call_2 is now pending; neither tool ran.
    assert_eq!(kernel.get_task(&task_id).unwrap().status, TaskStatus::AwaitingUser);
    let requests: Vec<_> = kernel
        .events_for_task(&task_id, 0)
        .into_iter()
        .filter_map(|s| match s.event {
            DomainEvent::UserInteractionRequested { request, .. } => Some(request),
            _ => None,
        })
        .collect();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].display.tool_call_id(), Some("call_2"));

    let audit = kernel.audit.read_all().unwrap();
    assert!(audit.is_empty(), "neither risky call should have reached the executor");
}

// Scenario 5: instruction resumes a done task.
#[tokio::test]
async fn instruction_added_to_a_done_task_resumes_and_recompletes() {
    let dir = tempfile::tempdir().unwrap();
    let kernel = kernel(dir.path(), Arc::new(FakeLlmClient::with_text("refined")), ToolRegistry::new());
    let (_router, _projector) = kernel.start();

    let task_id = kernel
        .create_task("T5", "do it", TaskPriority::Normal, Some("agent_seed_chat".into()), None, "user")
        .unwrap();
    kernel.conversation.append(&task_id, LlmMessage::user("hi")).unwrap();
    kernel.manager.wait_for_idle().await;
    assert_eq!(kernel.get_task(&task_id).unwrap().status, TaskStatus::Done);

    kernel.add_instruction(&task_id, "Please refine", "user").unwrap();
    kernel.manager.wait_for_idle().await;

    assert_eq!(kernel.get_task(&task_id).unwrap().status, TaskStatus::Done);
    let completed = kernel
        .events_for_task(&task_id, 0)
        .into_iter()
        .filter(|s| matches!(s.event, DomainEvent::TaskCompleted { .. }))
        .count();
    assert_eq!(completed, 2);

    let history = kernel.conversation.get_messages(&task_id).unwrap();
    assert!(history.iter().any(|m| m.text().as_deref() == Some("Please refine")));
}

/// Parent and child share one `"default"` LLM profile (profiles are
/// per-manager, not per-task). Call 0 (the parent) requests a subtask;
/// every later call (the child, and any grandchild) blocks forever, so the
/// child lands in `in_progress` and stays there until canceled instead of
/// recursively spawning further subtasks.
struct StepLlmClient {
    calls: std::sync::atomic::AtomicUsize,
    first: LlmCompletion,
    stall: Notify,
}

#[async_trait]
impl LlmClient for StepLlmClient {
    async fn complete(&self, _messages: &[LlmMessage], _tools: &[ToolDefinition]) -> Result<LlmCompletion> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(self.first.clone());
        }
        self.stall.notified().await;
        unreachable!("never notified")
    }
}

// Scenario 6: subtask cascade cancel.
//
// Driven at the `RuntimeManager` level rather than through `Kernel::open`:
// the subtask tool needs the exact same `EventStore` instance the manager
// routes events through (so its `subscribe()` actually observes what the
// manager appends), and `Kernel::open` always constructs its own store
// internally rather than accepting one — so this wires the manager by hand,
// the same way `manager.rs`'s own test module does.
#[tokio::test]
async fn canceling_the_parent_cascades_to_an_in_flight_subtask() {
    let dir = tempfile::tempdir().unwrap();
    let event_store = Arc::new(seed_eventstore::EventStore::open(dir.path().join("events")).unwrap());
    let conversation = Arc::new(seed_conversation::ConversationStore::open(dir.path().join("conversations")).unwrap());
    let audit = Arc::new(seed_audit::AuditLog::open(dir.path().join("audit")).unwrap());

    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(seed_kernel::SubtaskTool::new("agent_seed_chat", Arc::clone(&event_store), 5)));

    let llm: Arc<dyn LlmClient> = Arc::new(StepLlmClient {
        calls: std::sync::atomic::AtomicUsize::new(0),
        first: LlmCompletion {
            tool_calls: vec![ToolCallRequest {
                tool_call_id: "c1".into(),
                tool_name: "create_subtask_agent_seed_chat".into(),
                arguments: serde_json::json!({"title": "helper", "intent": "help out"}),
            }],
            stop_reason: "tool_use".into(),
            ..Default::default()
        },
        stall: Notify::new(),
    });

    let mut agents = AgentRegistry::new();
    agents.register(Arc::new(ChatAgent::new("agent_seed_chat")));
    let mut profiles: HashMap<String, Arc<dyn LlmClient>> = HashMap::new();
    profiles.insert("default".into(), llm);

    let manager = Arc::new(seed_kernel::RuntimeManager::new(
        Arc::clone(&event_store),
        conversation,
        audit,
        Arc::new(tools),
        Arc::new(agents),
        Arc::new(seed_kernel::UiBus::new()),
        profiles,
        dir.path().join("work"),
        40,
        false,
    ));
    manager.spawn_router();

    let parent_id = "parent".to_string();
    event_store
        .append_one(DomainEvent::TaskCreated {
            task_id: parent_id.clone(),
            title: "Parent".into(),
            intent: "spawn a helper".into(),
            priority: TaskPriority::Normal,
            agent_id: Some("agent_seed_chat".into()),
            parent_task_id: None,
            author_actor_id: "user".into(),
        })
        .unwrap();

    let child_id = poll_until_some(
        || {
            event_store.read_all(0).into_iter().find_map(|s| match s.event {
                DomainEvent::TaskCreated { task_id, parent_task_id: Some(p), .. } if p == parent_id => Some(task_id),
                _ => None,
            })
        },
        std::time::Duration::from_secs(2),
    )
    .await
    .expect("child task was never created");

    let child_started = poll_until(
        || {
            event_store
                .read_stream(&child_id, 0)
                .iter()
                .any(|s| matches!(s.event, DomainEvent::TaskStarted { .. }))
        },
        std::time::Duration::from_secs(2),
    )
    .await;
    assert!(child_started, "child task never started");

    event_store
        .append_one(DomainEvent::TaskCanceled { task_id: parent_id.clone(), reason: Some("user canceled".into()), author_actor_id: "user".into() })
        .unwrap();
    manager.wait_for_idle().await;

    let child_canceled = poll_until(
        || {
            event_store
                .read_stream(&child_id, 0)
                .iter()
                .any(|s| matches!(s.event, DomainEvent::TaskCanceled { .. }))
        },
        std::time::Duration::from_secs(2),
    )
    .await;
    assert!(child_canceled, "parent cancel never cascaded to the child");

    let child_canceled_reason = event_store
        .read_stream(&child_id, 0)
        .into_iter()
        .find_map(|s| match s.event {
            DomainEvent::TaskCanceled { reason, .. } => Some(reason),
            _ => None,
        })
        .unwrap();
    assert_eq!(child_canceled_reason.as_deref(), Some("parent task canceled"));
}

async fn poll_until_some<T, F: Fn() -> Option<T>>(f: F, timeout: std::time::Duration) -> Option<T> {
    let start = std::time::Instant::now();
    loop {
        if let Some(v) = f() {
            return Some(v);
        }
        if start.elapsed() >= timeout {
            return f();
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
}
