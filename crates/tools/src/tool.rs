//! The `Tool` trait and its execution context (§4.5).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use seed_domain::Result;
use serde_json::Value;

use crate::artifact::ArtifactStore;

/// `safe` tools run unconditionally; `risky` tools require a prior, bound
/// `UserInteractionResponded{selectedOptionId: "approve"}` (P7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Safe,
    Risky,
}

/// Cooperative cancellation signal, checked by long-running tools between
/// steps (e.g. a shell command polling loop). Mirrors the Agent Runtime's
/// own cancel flag (§4.8) but scoped to a single tool invocation.
#[derive(Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a tool's `execute` needs besides its own arguments.
pub struct ToolContext {
    pub task_id: String,
    pub actor_id: String,
    pub base_dir: PathBuf,
    pub artifacts: ArtifactStore,
    pub cancel: Option<CancelSignal>,
    /// Set only when the preceding interaction approved this exact risky
    /// call (P7); `canExecute`/`execute` may use its presence as proof of
    /// authorization without re-deriving it.
    pub confirmed_interaction_id: Option<String>,
}

/// A tool an agent can call, exposed to the LLM via [`Tool::definition`]
/// and invoked by the [`crate::executor::ToolExecutor`].
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for the tool's arguments.
    fn parameters(&self) -> Value;
    fn risk_level(&self) -> RiskLevel;
    /// An optional tag grouping related tools (e.g. "filesystem") for UI
    /// presentation; has no effect on execution.
    fn group(&self) -> Option<&str> {
        None
    }

    /// Pre-flight validation that runs *before* the risk gate, so a
    /// malformed risky call never prompts the user for approval it would
    /// fail anyway (§4.5).
    fn can_execute(&self, _args: &Value, _ctx: &ToolContext) -> std::result::Result<(), String> {
        Ok(())
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value>;
}

pub fn tool_definition(tool: &dyn Tool) -> seed_domain::ToolDefinition {
    seed_domain::ToolDefinition {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        parameters: tool.parameters(),
    }
}
