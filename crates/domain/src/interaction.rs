use serde::{Deserialize, Serialize};

/// Kind of structured interaction an agent can request from the user (UIP,
/// §4.10, §6 "UIP display metadata").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Select,
    Confirm,
    Input,
    Composite,
}

/// How the display payload should be rendered by the UI surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    PlainText,
    Json,
    Diff,
    Table,
}

/// A selectable option in a `Select`/`Confirm` interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionOption {
    pub id: String,
    pub label: String,
}

/// The renderable payload of an interaction request.
///
/// `metadata.tool_call_id` is how a risky-tool confirm binds to the exact
/// tool call it gates (SA-001, confused-deputy prevention — §6, I4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionDisplay {
    pub content_kind: Option<ContentKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl InteractionDisplay {
    /// The `toolCallId` a risky-tool confirm display is bound to, if any.
    pub fn tool_call_id(&self) -> Option<&str> {
        self.metadata.get("toolCallId").and_then(|v| v.as_str())
    }

    pub fn bind_tool_call(tool_call_id: impl Into<String>) -> Self {
        let mut metadata = serde_json::Map::new();
        metadata.insert("toolCallId".into(), serde_json::json!(tool_call_id.into()));
        Self {
            content_kind: Some(ContentKind::PlainText),
            body: None,
            metadata,
        }
    }
}

/// `{interactionId, kind, purpose, display, options?, validation?}` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRequest {
    pub interaction_id: String,
    pub kind: InteractionKind,
    pub purpose: String,
    #[serde(default)]
    pub display: InteractionDisplay,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<InteractionOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<serde_json::Value>,
}

/// The user's answer to an [`InteractionRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionResponse {
    pub interaction_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite: Option<serde_json::Value>,
}

impl InteractionResponse {
    /// True when this is a risky-tool approval (`selectedOptionId == "approve"`).
    pub fn is_approved(&self) -> bool {
        self.selected_option_id.as_deref() == Some("approve")
    }

    /// True when this is a risky-tool rejection (`selectedOptionId == "reject"`).
    pub fn is_rejected(&self) -> bool {
        self.selected_option_id.as_deref() == Some("reject")
    }
}
