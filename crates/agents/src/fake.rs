//! A scripted `LlmClient` for deterministic tests: a fake provider standing
//! in for a real SDK call.

use async_trait::async_trait;
use parking_lot::Mutex;
use seed_domain::{LlmMessage, Result, ToolCallRequest, ToolDefinition};

use crate::llm::{LlmClient, LlmCompletion};

/// Replays a fixed queue of completions, one per call. The last entry
/// repeats once the queue is exhausted, so a test doesn't have to predict
/// exactly how many rounds a loop will take.
pub struct FakeLlmClient {
    script: Mutex<Vec<LlmCompletion>>,
    calls: Mutex<usize>,
}

impl FakeLlmClient {
    pub fn with_text(content: impl Into<String>) -> Self {
        Self::new(vec![LlmCompletion {
            content: Some(content.into()),
            stop_reason: "end_turn".into(),
            ..Default::default()
        }])
    }

    pub fn with_tool_call(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self::new(vec![LlmCompletion {
            tool_calls: vec![ToolCallRequest {
                tool_call_id: tool_call_id.into(),
                tool_name: tool_name.into(),
                arguments,
            }],
            stop_reason: "tool_use".into(),
            ..Default::default()
        }])
    }

    pub fn new(script: Vec<LlmCompletion>) -> Self {
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl LlmClient for FakeLlmClient {
    async fn complete(
        &self,
        _messages: &[LlmMessage],
        _tools: &[ToolDefinition],
    ) -> Result<LlmCompletion> {
        let script = self.script.lock();
        let mut calls = self.calls.lock();
        let idx = (*calls).min(script.len().saturating_sub(1));
        *calls += 1;
        Ok(script
            .get(idx)
            .cloned()
            .unwrap_or_else(|| LlmCompletion {
                content: Some(String::new()),
                stop_reason: "end_turn".into(),
                ..Default::default()
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_final_entry_past_end_of_script() {
        let fake = FakeLlmClient::with_text("only");
        let a = fake.complete(&[], &[]).await.unwrap();
        let b = fake.complete(&[], &[]).await.unwrap();
        assert_eq!(a.content, b.content);
        assert_eq!(fake.call_count(), 2);
    }
}
