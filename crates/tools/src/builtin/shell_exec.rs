//! A risky shell-exec tool: a single foreground run with a hard timeout.
//! Seed's tool loop already has its own pause/cancel story (§4.8), so a
//! tool doesn't need its own background session management.

use std::time::Duration;

use async_trait::async_trait;
use seed_domain::{Error, Result};
use serde_json::Value;
use tokio::process::Command;

use crate::tool::{RiskLevel, Tool, ToolContext};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct ShellExecTool;

#[async_trait]
impl Tool for ShellExecTool {
    fn name(&self) -> &str {
        "shell_exec"
    }

    fn description(&self) -> &str {
        "Run a shell command in the task's working directory and return its output."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": { "type": "string" },
                "timeout_secs": { "type": "integer", "minimum": 1 }
            },
            "required": ["command"]
        })
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Risky
    }

    fn group(&self) -> Option<&str> {
        Some("shell")
    }

    fn can_execute(&self, args: &Value, _ctx: &ToolContext) -> std::result::Result<(), String> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or("missing required argument: command")?;
        if command.trim().is_empty() {
            return Err("command must not be empty".into());
        }
        Ok(())
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let command = args["command"].as_str().unwrap_or_default();
        let timeout = Duration::from_secs(
            args.get("timeout_secs").and_then(|v| v.as_u64()).unwrap_or(DEFAULT_TIMEOUT_SECS),
        );

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command).current_dir(&ctx.base_dir);
        cmd.kill_on_drop(true);

        let child = cmd.output();
        let output = tokio::time::timeout(timeout, child)
            .await
            .map_err(|_| Error::Other(format!("command timed out after {}s", timeout.as_secs())))??;

        Ok(serde_json::json!({
            "exit_code": output.status.code(),
            "stdout": String::from_utf8_lossy(&output.stdout),
            "stderr": String::from_utf8_lossy(&output.stderr),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactStore;

    fn ctx(dir: &std::path::Path) -> ToolContext {
        ToolContext {
            task_id: "t".into(),
            actor_id: "a".into(),
            base_dir: dir.to_path_buf(),
            artifacts: ArtifactStore::new(dir.join("artifacts")),
            cancel: None,
            confirmed_interaction_id: Some("i1".into()),
        }
    }

    #[tokio::test]
    async fn runs_command_and_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ShellExecTool;
        let out = tool
            .execute(serde_json::json!({"command": "echo hi"}), &ctx(dir.path()))
            .await
            .unwrap();
        assert_eq!(out["stdout"].as_str().unwrap().trim(), "hi");
        assert_eq!(out["exit_code"], 0);
    }

    #[test]
    fn can_execute_rejects_blank_command() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ShellExecTool;
        assert!(tool.can_execute(&serde_json::json!({"command": "  "}), &ctx(dir.path())).is_err());
    }

    #[test]
    fn is_risky() {
        assert_eq!(ShellExecTool.risk_level(), RiskLevel::Risky);
    }
}
