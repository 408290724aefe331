use crate::error::LLMResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Message role in a chat completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// List of messages in the conversation
    pub messages: Vec<Message>,

    /// Model identifier understood by the serving endpoint
    pub model: String,

    /// Temperature for sampling (0.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,

    /// Finish reason (e.g., "stop", "length")
    pub finish_reason: String,

    /// Token usage statistics
    pub usage: TokenUsage,

    /// Model that served the request
    pub model: String,
}

/// Model invocation boundary
///
/// Every backend (HTTP endpoint, local server, scripted test double) implements
/// this trait. The engine is agnostic to which one answers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Backend name for logging (e.g., "openai-compatible")
    fn backend_name(&self) -> &str;

    /// Generate a completion
    async fn complete(&self, request: CompletionRequest) -> LLMResult<CompletionResponse>;
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>, model: impl Into<String>) -> Self {
        Self {
            messages,
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new(
            vec![Message::system("judge"), Message::user("score this")],
            "judge-model",
        )
        .with_temperature(0.0)
        .with_max_tokens(512);

        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.max_tokens, Some(512));
    }

    #[test]
    fn test_request_skips_unset_parameters() {
        let request = CompletionRequest::new(vec![Message::user("hi")], "m");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("temperature").is_none());
        assert!(json.get("max_tokens").is_none());
    }
}
