//! The Agent Runtime (§4.8): owns one task's execution loop. An `Agent`
//! is risk-unaware and makes exactly one LLM round trip per `run()` call
//! (§4.11), so the runtime is what turns that into a multi-step tool loop —
//! re-entering `agent.run()` with refreshed history each time the previous
//! pass left tool calls to resolve, until the agent is out of tool calls
//! for the current round trip (at which point it must have yielded either
//! an `interaction` or a terminal `done`/`failed`).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;

use seed_agents::{Agent, AgentContext, AgentOutput, LlmClient};
use seed_audit::AuditLog;
use seed_conversation::{ConversationManager, ConversationStore};
use seed_domain::{DomainEvent, InteractionRequest, InteractionResponse, LlmMessage, Result, StreamChunk, ToolDefinition};
use seed_eventstore::EventStore;
use seed_tools::{CancelSignal, ToolRegistry};

use crate::output_handler::{ExecutionScope, OutputHandler};
use crate::ui::{UiBus, UiEvent};

/// Outcome of one drain cycle: either the task is waiting on the user
/// (`paused`), or it reached a terminal status (`terminal`), or — only
/// possible when `on_pause`/`on_cancel` interrupted a cycle mid-flight —
/// neither, in which case the runtime is left exactly where the caller
/// asked it to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeOutcome {
    pub paused: bool,
    pub terminal: bool,
}

impl RuntimeOutcome {
    fn paused() -> Self {
        Self { paused: true, terminal: false }
    }
    fn terminal() -> Self {
        Self { paused: false, terminal: true }
    }
    fn interrupted() -> Self {
        Self { paused: false, terminal: false }
    }
}

pub struct RuntimeDeps {
    pub event_store: Arc<EventStore>,
    pub conversation: Arc<ConversationStore>,
    pub audit: Arc<AuditLog>,
    pub tools: Arc<ToolRegistry>,
    pub ui: Arc<UiBus>,
    pub max_tool_loops: u32,
}

pub struct AgentRuntime {
    task_id: String,
    agent: Arc<dyn Agent>,
    llm: Arc<dyn LlmClient>,
    tool_definitions: Vec<ToolDefinition>,
    base_dir: PathBuf,
    deps: Arc<RuntimeDeps>,
    streaming_enabled: AtomicBool,
    paused_request: AtomicBool,
    cancel: CancelSignal,
    busy: AtomicBool,
}

impl AgentRuntime {
    pub fn new(
        task_id: impl Into<String>,
        agent: Arc<dyn Agent>,
        llm: Arc<dyn LlmClient>,
        base_dir: PathBuf,
        deps: Arc<RuntimeDeps>,
        streaming_enabled: bool,
    ) -> Self {
        let tool_definitions = deps.tools.definitions();
        Self {
            task_id: task_id.into(),
            agent,
            llm,
            tool_definitions,
            base_dir,
            deps,
            streaming_enabled: AtomicBool::new(streaming_enabled),
            paused_request: AtomicBool::new(false),
            cancel: CancelSignal::new(),
            busy: AtomicBool::new(false),
        }
    }

    pub fn set_streaming(&self, enabled: bool) {
        self.streaming_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Cooperative pause: checked at the top of each tool-loop iteration.
    /// Does not itself append `TaskPaused` — the caller (already holding
    /// the projection's verdict that the transition is legal) does that.
    pub fn request_pause(&self) {
        self.paused_request.store(true, Ordering::SeqCst);
    }

    /// Best-effort cancellation: stops the drain loop at its next check
    /// and signals any in-flight tool via `CancelSignal`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn scope(&self) -> ExecutionScope {
        ExecutionScope {
            task_id: self.task_id.clone(),
            actor_id: "agent".to_string(),
            base_dir: self.base_dir.clone(),
            cancel: Some(self.cancel.clone()),
        }
    }

    fn output_handler(&self) -> OutputHandler<'_> {
        OutputHandler::new(&self.deps.tools, &self.deps.audit, &self.deps.conversation)
    }

    /// Start a fresh task: append `TaskStarted`, then drain.
    pub async fn execute(&self) -> Result<RuntimeOutcome> {
        let stored = self.deps.event_store.append_one(DomainEvent::TaskStarted {
            task_id: self.task_id.clone(),
            author_actor_id: "system".into(),
        })?;
        let _ = stored;
        self.drain(None, None).await
    }

    /// Resume after a `TaskResumed` event (from `paused`) with no pending
    /// interaction answer to inject.
    pub async fn resume_from_pause(&self) -> Result<RuntimeOutcome> {
        self.paused_request.store(false, Ordering::SeqCst);
        self.drain(None, None).await
    }

    /// Resume after `UserInteractionResponded`. `request` is the
    /// interaction this response answers; the caller has already verified
    /// it matches the task's pending interaction (I2).
    pub async fn resume(&self, request: &InteractionRequest, response: InteractionResponse) -> Result<RuntimeOutcome> {
        if let Some(call_id) = request.display.tool_call_id() {
            if !response.is_approved() {
                self.deps.conversation.append(
                    &self.task_id,
                    LlmMessage::tool_result(call_id, None, "Error: tool call rejected by user"),
                )?;
                return self.drain(None, None).await;
            }
            let confirmed = Some((call_id.to_string(), response.interaction_id.clone()));
            return self.drain(None, confirmed).await;
        }
        self.drain(Some(response), None).await
    }

    /// Persist a user-authored follow-up message. Whether this should kick
    /// off a new drain (task was `done`) or just wait (task is
    /// `awaiting_user`) is the caller's call — it already has the
    /// projection's verdict.
    pub fn record_instruction(&self, message: LlmMessage) -> Result<()> {
        self.deps.conversation.append(&self.task_id, message)?;
        Ok(())
    }

    /// Re-enter the drain loop without a fresh interaction answer — used
    /// after `record_instruction` brings a `done` task back to
    /// `in_progress`.
    pub async fn continue_drain(&self) -> Result<RuntimeOutcome> {
        self.drain(None, None).await
    }

    async fn drain(
        &self,
        mut interaction_response: Option<InteractionResponse>,
        mut confirmed_for_call: Option<(String, String)>,
    ) -> Result<RuntimeOutcome> {
        self.busy.store(true, Ordering::SeqCst);
        let outcome = self.drain_inner(&mut interaction_response, &mut confirmed_for_call).await;
        self.busy.store(false, Ordering::SeqCst);
        outcome
    }

    async fn drain_inner(
        &self,
        interaction_response: &mut Option<InteractionResponse>,
        confirmed_for_call: &mut Option<(String, String)>,
    ) -> Result<RuntimeOutcome> {
        let handler = self.output_handler();
        let scope = self.scope();
        let mut loops: u32 = 0;

        loop {
            if self.cancel.is_canceled() {
                return Ok(RuntimeOutcome::interrupted());
            }
            if self.paused_request.swap(false, Ordering::SeqCst) {
                return Ok(RuntimeOutcome::interrupted());
            }

            let history = self.deps.conversation.get_messages(&self.task_id)?;
            let pending = ConversationManager::pending_tool_calls(&history);

            if !pending.is_empty() {
                for call in pending {
                    loops += 1;
                    if loops > self.deps.max_tool_loops {
                        return self.fail_loop_exceeded().await;
                    }
                    let conf = confirmed_for_call
                        .take()
                        .filter(|(call_id, _)| *call_id == call.tool_call_id);
                    self.deps.ui.publish(
                        &self.task_id,
                        UiEvent::ToolCallStart {
                            tool_call_id: call.tool_call_id.clone(),
                            tool_name: call.tool_name.clone(),
                        },
                    );
                    let handled = handler
                        .handle(
                            AgentOutput::ToolCall { tool_call: call.clone() },
                            &scope,
                            conf.as_ref().map(|(a, b)| (a.as_str(), b.as_str())),
                        )
                        .await?;
                    if !handled.events.is_empty() {
                        self.deps.event_store.append(handled.events)?;
                    }
                    if handled.pause {
                        return Ok(RuntimeOutcome::paused());
                    }
                    self.deps.ui.publish(
                        &self.task_id,
                        UiEvent::ToolCallEnd { tool_call_id: call.tool_call_id.clone(), is_error: false },
                    );
                }
                continue;
            }

            loops += 1;
            if loops > self.deps.max_tool_loops {
                return self.fail_loop_exceeded().await;
            }

            let streaming_enabled = self.streaming_enabled.load(Ordering::SeqCst);
            let task_id_for_chunks = self.task_id.clone();
            let ui_for_chunks = Arc::clone(&self.deps.ui);
            let ctx = AgentContext {
                task_id: self.task_id.clone(),
                history,
                tool_definitions: self.tool_definitions.clone(),
                llm: Arc::clone(&self.llm),
                streaming_enabled,
                pending_interaction_response: interaction_response.take(),
                on_stream_chunk: Some(Arc::new(move |chunk: StreamChunk| {
                    ui_for_chunks.publish(&task_id_for_chunks, UiEvent::StreamDelta { chunk });
                })),
            };

            let mut stream = self.agent.run(ctx).await;
            let mut outputs = Vec::new();
            while let Some(output) = stream.next().await {
                self.deps.ui.publish(&self.task_id, UiEvent::AgentOutput { output: output.clone() });
                outputs.push(output);
            }
            self.deps.ui.publish(&self.task_id, UiEvent::StreamEnd);

            let mut text_acc = String::new();
            let mut done_summary: Option<Option<String>> = None;
            let mut tool_calls = Vec::new();
            for output in &outputs {
                match output {
                    AgentOutput::Done { summary } => done_summary = Some(summary.clone()),
                    AgentOutput::Text { text: t } => text_acc.push_str(t),
                    AgentOutput::ToolCall { tool_call } => tool_calls.push(tool_call.clone()),
                    _ => {}
                }
            }
            // `Done.summary` already carries the full final text (accumulated
            // internally by a streaming agent, or the one-shot content of a
            // non-streaming completion); fall back to the concatenated
            // `Text` deltas only when there's no terminal summary to prefer.
            let text = match done_summary {
                Some(summary) => summary,
                None if !text_acc.is_empty() => Some(text_acc),
                None => None,
            };
            if text.is_some() || !tool_calls.is_empty() {
                self.deps.conversation.append(
                    &self.task_id,
                    LlmMessage::assistant_tool_calls(text.clone(), tool_calls.clone()),
                )?;
            }

            let mut settled = false;
            for output in outputs {
                match output {
                    AgentOutput::Interaction { .. } | AgentOutput::Done { .. } | AgentOutput::Failed { .. } => {
                        let handled = handler.handle(output, &scope, None).await?;
                        if !handled.events.is_empty() {
                            self.deps.event_store.append(handled.events)?;
                        }
                        if handled.pause {
                            return Ok(RuntimeOutcome::paused());
                        }
                        if handled.terminal {
                            return Ok(RuntimeOutcome::terminal());
                        }
                        settled = true;
                    }
                    _ => {}
                }
            }

            if !settled && tool_calls.is_empty() {
                // Protocol violation: a pass produced neither tool calls
                // nor a terminal/interaction output.
                let stored = self.deps.event_store.append_one(DomainEvent::TaskFailed {
                    task_id: self.task_id.clone(),
                    reason: "agent produced no tool calls and no terminal output".into(),
                    author_actor_id: "system".into(),
                })?;
                let _ = stored;
                return Ok(RuntimeOutcome::terminal());
            }
        }
    }

    async fn fail_loop_exceeded(&self) -> Result<RuntimeOutcome> {
        self.deps.event_store.append_one(DomainEvent::TaskFailed {
            task_id: self.task_id.clone(),
            reason: format!("exceeded max_tool_loops ({})", self.deps.max_tool_loops),
            author_actor_id: "system".into(),
        })?;
        Ok(RuntimeOutcome::terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seed_agents::{ChatAgent, FakeLlmClient};
    use seed_tools::builtin::read_file::ReadFileTool;
    use std::sync::Arc as StdArc;

    fn deps(dir: &std::path::Path) -> Arc<RuntimeDeps> {
        let event_store = Arc::new(EventStore::open(dir.join("events")).unwrap());
        let conversation = Arc::new(ConversationStore::open(dir.join("conversations")).unwrap());
        let audit = Arc::new(AuditLog::open(dir.join("audit")).unwrap());
        let mut registry = ToolRegistry::new();
        registry.register(StdArc::new(ReadFileTool));
        Arc::new(RuntimeDeps {
            event_store,
            conversation,
            audit,
            tools: Arc::new(registry),
            ui: Arc::new(UiBus::new()),
            max_tool_loops: 10,
        })
    }

    #[tokio::test]
    async fn happy_path_completes_task() {
        let dir = tempfile::tempdir().unwrap();
        let deps = deps(dir.path());
        deps.event_store
            .append_one(DomainEvent::TaskCreated {
                task_id: "t1".into(),
                title: "T".into(),
                intent: "do it".into(),
                priority: Default::default(),
                agent_id: Some("agent_seed_chat".into()),
                parent_task_id: None,
                author_actor_id: "user".into(),
            })
            .unwrap();
        deps.conversation.append("t1", LlmMessage::user("hi")).unwrap();

        let llm = StdArc::new(FakeLlmClient::with_text("done talking"));
        let agent = StdArc::new(ChatAgent::new("agent_seed_chat"));
        let runtime = AgentRuntime::new("t1", agent, llm, dir.path().join("work"), deps, false);

        let outcome = runtime.execute().await.unwrap();
        assert!(outcome.terminal);
        assert!(!outcome.paused);
    }

    #[tokio::test]
    async fn risky_tool_call_pauses_for_approval_then_resumes() {
        use seed_tools::builtin::shell_exec::ShellExecTool;
        let dir = tempfile::tempdir().unwrap();
        let event_store = Arc::new(EventStore::open(dir.path().join("events2")).unwrap());
        let conversation = Arc::new(ConversationStore::open(dir.path().join("conversations2")).unwrap());
        let audit = Arc::new(AuditLog::open(dir.path().join("audit2")).unwrap());
        let mut registry = ToolRegistry::new();
        registry.register(StdArc::new(ShellExecTool));
        let deps = Arc::new(RuntimeDeps {
            event_store,
            conversation,
            audit,
            tools: Arc::new(registry),
            ui: Arc::new(UiBus::new()),
            max_tool_loops: 10,
        });

        deps.event_store
            .append_one(DomainEvent::TaskCreated {
                task_id: "t1".into(),
                title: "T".into(),
                intent: "run a command".into(),
                priority: Default::default(),
                agent_id: Some("agent_seed_chat".into()),
                parent_task_id: None,
                author_actor_id: "user".into(),
            })
            .unwrap();
        deps.conversation.append("t1", LlmMessage::user("run echo hi")).unwrap();

        let llm = StdArc::new(FakeLlmClient::with_tool_call("c1", "shell_exec", serde_json::json!({"command": "echo hi"})));
        let agent = StdArc::new(ChatAgent::new("agent_seed_chat"));
        let runtime = AgentRuntime::new("t1", agent, llm, dir.path().join("work2"), deps.clone(), false);

        let outcome = runtime.execute().await.unwrap();
        assert!(outcome.paused);

        let stored = deps.event_store.read_stream("t1", 1);
        let request = stored
            .iter()
            .find_map(|s| match &s.event {
                DomainEvent::UserInteractionRequested { request, .. } => Some(request.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(request.display.tool_call_id(), Some("c1"));

        let response = InteractionResponse {
            interaction_id: request.interaction_id.clone(),
            selected_option_id: Some("approve".into()),
            text: None,
            composite: None,
        };
        let outcome = runtime.resume(&request, response).await.unwrap();
        assert!(outcome.terminal);
    }
}
