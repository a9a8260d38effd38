use async_trait::async_trait;
use seed_domain::Result;
use serde_json::Value;

use crate::builtin::path_guard::validate_path;
use crate::tool::{RiskLevel, Tool, ToolContext};

/// Read a text file within the task's base directory. Safe: read-only.
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a UTF-8 text file relative to the task's working directory."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path relative to the task's base directory." }
            },
            "required": ["path"]
        })
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Safe
    }

    fn group(&self) -> Option<&str> {
        Some("filesystem")
    }

    fn can_execute(&self, args: &Value, ctx: &ToolContext) -> std::result::Result<(), String> {
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or("missing required argument: path")?;
        validate_path(&ctx.base_dir, path)?;
        Ok(())
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let path = args["path"].as_str().unwrap_or_default();
        let resolved = validate_path(&ctx.base_dir, path)
            .map_err(seed_domain::Error::Other)?;
        let content = tokio::fs::read_to_string(&resolved).await?;
        Ok(serde_json::json!({ "content": content }))
    }
}
