//! The Output Handler (§4.7): translates one `AgentOutput` into the
//! `DomainEvent`s it produces and whether the Agent Runtime should pause or
//! stop. It is a pure translator over policy — it never reads the Task
//! Projection, and the events it returns are appended by the caller.

use std::path::PathBuf;

use seed_audit::AuditLog;
use seed_conversation::ConversationStore;
use seed_domain::{
    ContentKind, DomainEvent, InteractionDisplay, InteractionKind, InteractionOption,
    InteractionRequest, LlmMessage, Result,
};
use seed_tools::{CancelSignal, RiskLevel, ToolContext, ToolExecutor, ToolRegistry};

use seed_agents::AgentOutput;

/// The effect of handling one `AgentOutput`: zero or more events to append,
/// and whether the runtime must stop draining (pause for user input, or
/// stop because the task reached a terminal state).
#[derive(Debug, Default)]
pub struct HandledOutput {
    pub events: Vec<DomainEvent>,
    pub pause: bool,
    pub terminal: bool,
}

impl HandledOutput {
    fn none() -> Self {
        Self::default()
    }
}

/// Everything the handler needs to build a [`ToolContext`] for a tool call,
/// minus the per-call `confirmed_interaction_id` (threaded in by the
/// runtime only when this exact call was just approved).
pub struct ExecutionScope {
    pub task_id: String,
    pub actor_id: String,
    pub base_dir: PathBuf,
    pub cancel: Option<CancelSignal>,
}

pub struct OutputHandler<'a> {
    registry: &'a ToolRegistry,
    executor: ToolExecutor<'a>,
    conversation: &'a ConversationStore,
}

impl<'a> OutputHandler<'a> {
    pub fn new(registry: &'a ToolRegistry, audit: &'a AuditLog, conversation: &'a ConversationStore) -> Self {
        Self {
            registry,
            executor: ToolExecutor::new(registry, audit),
            conversation,
        }
    }

    /// Handle one `AgentOutput`, per the table in §4.7.
    ///
    /// `confirmed_interaction_id` is `Some` only on the pass that resumes
    /// from an approved risky-tool interaction, and only applies to the one
    /// tool call that interaction was bound to — the caller is responsible
    /// for clearing it once that call has been handled.
    pub async fn handle(
        &self,
        output: AgentOutput,
        scope: &ExecutionScope,
        confirmed_for_call: Option<(&str, &str)>,
    ) -> Result<HandledOutput> {
        match output {
            AgentOutput::Text { .. } | AgentOutput::Reasoning { .. } | AgentOutput::Verbose { .. } => {
                // UI-only narration; not persisted as a domain event or
                // conversation message (the runtime persists the assistant
                // message as a whole once a pass completes).
                Ok(HandledOutput::none())
            }
            AgentOutput::Error { .. } => Ok(HandledOutput::none()),
            AgentOutput::Interaction { request } => Ok(HandledOutput {
                events: vec![DomainEvent::UserInteractionRequested {
                    task_id: scope.task_id.clone(),
                    request,
                    author_actor_id: scope.actor_id.clone(),
                }],
                pause: true,
                terminal: false,
            }),
            AgentOutput::ToolCall { tool_call } => {
                self.handle_tool_call(tool_call, scope, confirmed_for_call).await
            }
            AgentOutput::Done { summary } => Ok(HandledOutput {
                events: vec![DomainEvent::TaskCompleted {
                    task_id: scope.task_id.clone(),
                    summary,
                    author_actor_id: scope.actor_id.clone(),
                }],
                pause: false,
                terminal: true,
            }),
            AgentOutput::Failed { reason } => Ok(HandledOutput {
                events: vec![DomainEvent::TaskFailed {
                    task_id: scope.task_id.clone(),
                    reason,
                    author_actor_id: scope.actor_id.clone(),
                }],
                pause: false,
                terminal: true,
            }),
        }
    }

    async fn handle_tool_call(
        &self,
        tool_call: seed_domain::ToolCallRequest,
        scope: &ExecutionScope,
        confirmed_for_call: Option<(&str, &str)>,
    ) -> Result<HandledOutput> {
        let Some(tool) = self.registry.get(&tool_call.tool_name) else {
            self.persist_tool_result(scope, &tool_call.tool_call_id, None, "tool not found", true)?;
            return Ok(HandledOutput::none());
        };

        let confirmed_interaction_id = confirmed_for_call
            .filter(|(call_id, _)| *call_id == tool_call.tool_call_id)
            .map(|(_, interaction_id)| interaction_id.to_string());

        // Risky + not already approved for *this exact call*: gate behind
        // an interaction instead of letting `ToolExecutor` deny it outright
        // (SA-001) — but only if the call would otherwise be runnable, so a
        // malformed risky call never prompts for an approval it would fail
        // anyway (§4.5).
        if tool.risk_level() == RiskLevel::Risky && confirmed_interaction_id.is_none() {
            let probe = ToolContext {
                task_id: scope.task_id.clone(),
                actor_id: scope.actor_id.clone(),
                base_dir: scope.base_dir.clone(),
                artifacts: seed_tools::ArtifactStore::new(scope.base_dir.clone()),
                cancel: scope.cancel.clone(),
                confirmed_interaction_id: None,
            };
            if let Err(message) = tool.can_execute(&tool_call.arguments, &probe) {
                self.persist_tool_result(scope, &tool_call.tool_call_id, Some(tool_call.tool_name.clone()), &message, true)?;
                return Ok(HandledOutput::none());
            }

            let request = InteractionRequest {
                interaction_id: format!("ui_{}", uuid::Uuid::new_v4()),
                kind: InteractionKind::Confirm,
                purpose: format!("Approve call to `{}`?", tool_call.tool_name),
                display: {
                    let mut display = InteractionDisplay::bind_tool_call(tool_call.tool_call_id.clone());
                    display.content_kind = Some(ContentKind::Json);
                    display.body = Some(tool_call.arguments.to_string());
                    display
                },
                options: Some(vec![
                    InteractionOption { id: "approve".into(), label: "Approve".into() },
                    InteractionOption { id: "reject".into(), label: "Reject".into() },
                ]),
                validation: None,
            };
            return Ok(HandledOutput {
                events: vec![DomainEvent::UserInteractionRequested {
                    task_id: scope.task_id.clone(),
                    request,
                    author_actor_id: "agent".into(),
                }],
                pause: true,
                terminal: false,
            });
        }

        let ctx = ToolContext {
            task_id: scope.task_id.clone(),
            actor_id: scope.actor_id.clone(),
            base_dir: scope.base_dir.clone(),
            artifacts: seed_tools::ArtifactStore::new(scope.base_dir.clone()),
            cancel: scope.cancel.clone(),
            confirmed_interaction_id,
        };
        let result = self.executor.execute(&tool_call, ctx).await?;
        self.persist_tool_result(
            scope,
            &result.tool_call_id,
            Some(tool_call.tool_name),
            &result.output.to_string(),
            result.is_error,
        )?;
        Ok(HandledOutput::none())
    }

    fn persist_tool_result(
        &self,
        scope: &ExecutionScope,
        tool_call_id: &str,
        tool_name: Option<String>,
        output: &str,
        is_error: bool,
    ) -> Result<()> {
        let content = if is_error { format!("Error: {output}") } else { output.to_string() };
        self.conversation
            .append(&scope.task_id, LlmMessage::tool_result(tool_call_id, tool_name, content))?;
        Ok(())
    }
}
