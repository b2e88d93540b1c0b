use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AiError, Result};

// =============================================================================
// Conversation messages
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

// =============================================================================
// Tool definitions and completions
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub parameters: Value,
}

/// What the model came back with: either plain text or a request to invoke
/// one of the supplied tools. The caller decides what a tool call means.
#[derive(Debug, Clone)]
pub enum Completion {
    Text(String),
    ToolCall { name: String, arguments: Value },
}

/// The consumed reasoning-collaborator boundary. The pipeline depends only
/// on this shape, never on a concrete provider, so deterministic tests can
/// stub it out.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        tools: &[ToolDefinition],
        messages: &[Message],
    ) -> Result<Completion>;
}

// =============================================================================
// Wire types (OpenAI chat completions)
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolWire>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ToolWire {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: ToolDefinition,
}

impl From<&ToolDefinition> for ToolWire {
    fn from(def: &ToolDefinition) -> Self {
        Self {
            kind: "function",
            function: def.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseMessage {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCallWire>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolCallWire {
    pub function: FunctionCallWire,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FunctionCallWire {
    pub name: String,
    /// The provider sends arguments as a JSON-encoded string.
    pub arguments: String,
}

impl ChatResponse {
    /// Map the first choice to a `Completion`. A tool call wins over text.
    pub fn into_completion(self) -> Result<Completion> {
        let message = self
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or(AiError::EmptyCompletion)?;

        if let Some(call) = message.tool_calls.and_then(|calls| calls.into_iter().next()) {
            let arguments: Value = serde_json::from_str(&call.function.arguments)?;
            return Ok(Completion::ToolCall {
                name: call.function.name,
                arguments,
            });
        }

        match message.content {
            Some(text) => Ok(Completion::Text(text)),
            None => Err(AiError::EmptyCompletion),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_response_parses_arguments() {
        let raw = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "search_places",
                            "arguments": "{\"location\": \"Seattle\"}"
                        }
                    }]
                }
            }]
        }"#;
        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        match response.into_completion().unwrap() {
            Completion::ToolCall { name, arguments } => {
                assert_eq!(name, "search_places");
                assert_eq!(arguments["location"], "Seattle");
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn text_response_maps_to_text() {
        let raw = r#"{"choices": [{"message": {"content": "hello there"}}]}"#;
        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        match response.into_completion().unwrap() {
            Completion::Text(text) => assert_eq!(text, "hello there"),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn malformed_tool_arguments_are_a_parse_error() {
        let raw = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "function": {"name": "search_places", "arguments": "not json"}
                    }]
                }
            }]
        }"#;
        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            response.into_completion(),
            Err(AiError::Parse(_))
        ));
    }

    #[test]
    fn empty_choices_is_empty_completion() {
        let raw = r#"{"choices": []}"#;
        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            response.into_completion(),
            Err(AiError::EmptyCompletion)
        ));
    }
}
