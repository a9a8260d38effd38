use serde::{Deserialize, Serialize};

/// Internal tool call format (provider-agnostic). Every `LLMClient` adapter
/// converts provider-specific tool calls to/from this.
///
/// `tool_call_id` is the join key between an assistant message's tool call
/// and the later `tool` message carrying its result (glossary: ToolCallId).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallRequest {
    pub tool_call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

/// Tool definition exposed to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A message in the conversation, stored in the Conversation Store in
/// append order (§4.2, §3 "LLMMessage").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum LlmMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reasoning: Option<String>,
    },
    Tool {
        tool_call_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        content: String,
    },
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            reasoning: None,
        }
    }

    pub fn assistant_tool_calls(
        content: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        Self::Assistant {
            content,
            tool_calls,
            reasoning: None,
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: Option<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            tool_name,
            content: content.into(),
        }
    }

    /// The tool calls carried by an `assistant` message, if any.
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// The `tool_call_id` this message resolves, if it is a `tool` message.
    pub fn resolved_tool_call_id(&self) -> Option<&str> {
        match self {
            Self::Tool { tool_call_id, .. } => Some(tool_call_id.as_str()),
            _ => None,
        }
    }

    /// Plain-text content, where applicable.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::System { content } | Self::User { content } => Some(content.as_str()),
            Self::Assistant { content, .. } => content.as_deref(),
            Self::Tool { content, .. } => Some(content.as_str()),
        }
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, Self::Assistant { .. })
    }

    pub fn is_tool(&self) -> bool {
        matches!(self, Self::Tool { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_with_tool_calls_round_trips() {
        let msg = LlmMessage::assistant_tool_calls(
            Some("checking".into()),
            vec![ToolCallRequest {
                tool_call_id: "c1".into(),
                tool_name: "exec".into(),
                arguments: serde_json::json!({"command": "ls"}),
            }],
        );
        let json = serde_json::to_string(&msg).unwrap();
        let back: LlmMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tool_calls().len(), 1);
        assert_eq!(back.tool_calls()[0].tool_call_id, "c1");
    }

    #[test]
    fn tool_message_resolves_call_id() {
        let msg = LlmMessage::tool_result("c1", Some("exec".into()), "ok");
        assert_eq!(msg.resolved_tool_call_id(), Some("c1"));
        assert!(msg.is_tool());
    }

    #[test]
    fn system_and_user_text() {
        assert_eq!(LlmMessage::system("sys").text(), Some("sys"));
        assert_eq!(LlmMessage::user("hi").text(), Some("hi"));
    }
}
