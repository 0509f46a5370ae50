//! Chat Completion API
//!
//! OpenAI-shaped request/response bodies. Every backend the router talks to
//! accepts this wire format; provider-specific parameters go through `extra`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A message in a chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role: "system", "user" or "assistant"
    pub role: String,

    /// Plain-text message content
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier as the provider expects it
    pub model: String,

    /// Messages in the conversation
    pub messages: Vec<Message>,

    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Enable streaming (the router always requests non-streaming bodies)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    /// Additional parameters (provider-specific)
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl CompletionRequest {
    /// Create a new non-streaming completion request
    pub fn new(model: String, messages: Vec<Message>) -> Self {
        Self {
            model,
            messages,
            temperature: None,
            max_tokens: None,
            stream: Some(false),
            extra: HashMap::new(),
        }
    }
}

/// Chat completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub choices: Vec<Choice>,

    #[serde(default)]
    pub usage: Option<Usage>,
}

impl CompletionResponse {
    /// Text of the first choice, if any
    pub fn first_text(&self) -> Option<&str> {
        self.choices
            .first()
            .map(|choice| choice.message.content.as_str())
    }
}

/// A single completion choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,

    pub message: ResponseMessage,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Message returned by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub content: String,
}

/// Token usage accounting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,

    #[serde(default)]
    pub completion_tokens: u32,

    #[serde(default)]
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_extra_inline() {
        let mut request = CompletionRequest::new(
            "gpt-4".to_string(),
            vec![Message::user("hello")],
        );
        request
            .extra
            .insert("top_p".to_string(), serde_json::json!(0.9));

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["top_p"], 0.9);
        assert_eq!(body["stream"], false);
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn response_first_text() {
        let body = r#"{
            "id": "cmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "OK"}, "finish_reason": "stop"}
            ],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4}
        }"#;

        let response: CompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.first_text(), Some("OK"));
    }

    #[test]
    fn response_without_choices() {
        let response: CompletionResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.first_text(), None);
    }
}
