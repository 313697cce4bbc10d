//! Chat completion wire shapes
//!
//! Only the parts of the OpenAI-compatible chat schema this crate touches
//! are modelled; everything else rides along in `extra` untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Prompt sent by the local smoke test
pub const SMOKE_TEST_PROMPT: &str = "Hello, how are you?";

/// JSON pointer to the assistant reply in a chat completion response
pub const ASSISTANT_REPLY_POINTER: &str = "/choices/0/message/content";

/// Single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    /// Plain string or a multimodal content array
    pub content: Value,
}

impl ChatMessage {
    /// User message with plain text content
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Value::String(content.into()),
        }
    }
}

/// Chat completion request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatCompletionRequest {
    /// Single-turn user request
    pub fn single_turn(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            messages: vec![ChatMessage::user(prompt)],
            stream: None,
            extra: Map::new(),
        }
    }

    /// Parse and validate a request body
    pub fn parse(body: &[u8]) -> Result<Self, String> {
        let request: Self = serde_json::from_slice(body).map_err(|e| e.to_string())?;

        if request.messages.is_empty() {
            return Err("messages must contain at least one message".to_string());
        }

        if let Some(message) = request.messages.iter().find(|m| m.role.is_empty()) {
            return Err(format!("message role must be non-empty: {:?}", message));
        }

        Ok(request)
    }

    /// Whether the caller asked for a streamed response
    pub fn is_streaming(&self) -> bool {
        self.stream.unwrap_or(false)
    }
}

/// Pull `choices[0].message.content` out of a raw response body
///
/// Returns `None` for anything that is not JSON, lacks the field, or whose
/// content is not a string.
pub fn extract_assistant_reply(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer(ASSISTANT_REPLY_POINTER)
        .and_then(Value::as_str)
        .map(str::to_string)
}
