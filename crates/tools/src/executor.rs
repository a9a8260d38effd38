//! The `ToolExecutor` (§4.5): look up tool, append `ToolCallRequested`,
//! run, append `ToolCallCompleted`, return the result. `canExecute` is
//! checked before the risk gate.

use seed_audit::AuditLog;
use seed_domain::{Error, Result, ToolCallRequest, TraceEvent};

use crate::registry::ToolRegistry;
use crate::tool::{RiskLevel, ToolContext};

/// The outcome of a tool call, as returned to the agent loop for appending
/// to the Conversation Store as a `tool` message.
pub struct ToolResult {
    pub tool_call_id: String,
    pub output: serde_json::Value,
    pub is_error: bool,
}

pub struct ToolExecutor<'a> {
    registry: &'a ToolRegistry,
    audit: &'a AuditLog,
}

impl<'a> ToolExecutor<'a> {
    pub fn new(registry: &'a ToolRegistry, audit: &'a AuditLog) -> Self {
        Self { registry, audit }
    }

    /// Run `call` under `ctx`. A risky tool whose `ctx.confirmed_interaction_id`
    /// is absent is denied without ever calling `execute` (P7); the caller
    /// is responsible for having already bound and verified that the
    /// approval belongs to this exact `tool_call_id` (§4.10, §6 SA-001).
    pub async fn execute(&self, call: &ToolCallRequest, ctx: ToolContext) -> Result<ToolResult> {
        let Some(tool) = self.registry.get(&call.tool_name) else {
            return Err(Error::ToolNotFound(call.tool_name.clone()));
        };

        if let Err(message) = tool.can_execute(&call.arguments, &ctx) {
            TraceEvent::ToolCallDenied {
                task_id: ctx.task_id.clone(),
                tool_call_id: call.tool_call_id.clone(),
                tool_name: call.tool_name.clone(),
            }
            .emit();
            return Ok(ToolResult {
                tool_call_id: call.tool_call_id.clone(),
                output: serde_json::json!({ "error": message }),
                is_error: true,
            });
        }

        if tool.risk_level() == RiskLevel::Risky && ctx.confirmed_interaction_id.is_none() {
            TraceEvent::ToolCallDenied {
                task_id: ctx.task_id.clone(),
                tool_call_id: call.tool_call_id.clone(),
                tool_name: call.tool_name.clone(),
            }
            .emit();
            return Ok(ToolResult {
                tool_call_id: call.tool_call_id.clone(),
                output: serde_json::json!({ "error": "risky tool call was not approved" }),
                is_error: true,
            });
        }

        let requested = self.audit.record_requested(
            &ctx.task_id,
            &call.tool_call_id,
            &call.tool_name,
            call.arguments.clone(),
        )?;
        TraceEvent::ToolCallRequested {
            task_id: ctx.task_id.clone(),
            tool_call_id: call.tool_call_id.clone(),
            tool_name: call.tool_name.clone(),
            requires_confirmation: tool.risk_level() == RiskLevel::Risky,
        }
        .emit();

        let start = std::time::Instant::now();
        let (output, is_error) = match tool.execute(call.arguments.clone(), &ctx).await {
            Ok(value) => (value, false),
            Err(e) => (serde_json::json!({ "error": e.to_string() }), true),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        self.audit.record_completed(&requested, output.clone(), is_error)?;
        TraceEvent::ToolCallCompleted {
            task_id: ctx.task_id.clone(),
            tool_call_id: call.tool_call_id.clone(),
            tool_name: call.tool_name.clone(),
            duration_ms,
            is_error,
        }
        .emit();

        Ok(ToolResult {
            tool_call_id: call.tool_call_id.clone(),
            output,
            is_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactStore;
    use crate::builtin::read_file::ReadFileTool;
    use crate::registry::ToolRegistry;
    use std::sync::Arc;

    fn ctx(task_dir: &std::path::Path) -> ToolContext {
        ToolContext {
            task_id: "t1".into(),
            actor_id: "agent".into(),
            base_dir: task_dir.to_path_buf(),
            artifacts: ArtifactStore::new(task_dir.join("artifacts")),
            cancel: None,
            confirmed_interaction_id: None,
        }
    }

    #[tokio::test]
    async fn unknown_tool_errors() {
        let registry = ToolRegistry::new();
        let audit_dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::open(audit_dir.path()).unwrap();
        let executor = ToolExecutor::new(&registry, &audit);
        let task_dir = tempfile::tempdir().unwrap();

        let call = ToolCallRequest {
            tool_call_id: "c1".into(),
            tool_name: "nonexistent".into(),
            arguments: serde_json::json!({}),
        };
        let result = executor.execute(&call, ctx(task_dir.path())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn safe_tool_runs_and_audits() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(ReadFileTool));
        let audit_dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::open(audit_dir.path()).unwrap();
        let executor = ToolExecutor::new(&registry, &audit);

        let task_dir = tempfile::tempdir().unwrap();
        std::fs::write(task_dir.path().join("hello.txt"), "hi").unwrap();

        let call = ToolCallRequest {
            tool_call_id: "c1".into(),
            tool_name: "read_file".into(),
            arguments: serde_json::json!({ "path": "hello.txt" }),
        };
        let result = executor.execute(&call, ctx(task_dir.path())).await.unwrap();
        assert!(!result.is_error);
        assert_eq!(result.output["content"], "hi");

        let raw = std::fs::read_to_string(audit_dir.path().join("audit.jsonl")).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }
}
