use crate::error::{LLMError, LLMResult};
use crate::provider::{CompletionClient, CompletionRequest, CompletionResponse, TokenUsage};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Connection settings for an OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Base URL including the API prefix (e.g., "http://llm.internal:8000/v1")
    pub base_url: String,

    /// Bearer token, if the endpoint requires one
    pub api_key: Option<String>,

    /// Default model identifier
    pub model: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl ClientSettings {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client for any server exposing the OpenAI `/chat/completions` route
pub struct OpenAICompatibleClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
    default_model: String,
}

impl OpenAICompatibleClient {
    /// Create a new client, validating the base URL up front
    pub fn new(settings: ClientSettings) -> LLMResult<Self> {
        let endpoint = Self::completions_url(&settings.base_url)?;
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| LLMError::InvalidRequest(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            api_key: settings.api_key,
            default_model: settings.model,
        })
    }

    /// Default model configured for this client
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Resolved completions endpoint
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn completions_url(base_url: &str) -> LLMResult<Url> {
        // Url::join drops the last path segment unless the base ends with '/'
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let invalid = |e: url::ParseError| {
            LLMError::InvalidRequest(format!("Invalid base URL '{}': {}", base_url, e))
        };
        Url::parse(&normalized)
            .and_then(|base| base.join("chat/completions"))
            .map_err(invalid)
    }

    fn parse_response(body: &str) -> LLMResult<CompletionResponse> {
        let raw: RawCompletion = serde_json::from_str(body)?;
        let choice = raw
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::EmptyResponse("No choices in response".into()))?;

        let content = choice.message.content.unwrap_or_default();
        if content.trim().is_empty() {
            return Err(LLMError::EmptyResponse("Choice has no content".into()));
        }

        Ok(CompletionResponse {
            content,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage: raw.usage.unwrap_or_default(),
            model: raw.model.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawCompletion {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<RawChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct RawChoice {
    message: RawMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OpenAICompatibleClient {
    fn backend_name(&self) -> &str {
        "openai-compatible"
    }

    async fn complete(&self, mut request: CompletionRequest) -> LLMResult<CompletionResponse> {
        if request.model.is_empty() {
            request.model = self.default_model.clone();
        }
        debug!(endpoint = %self.endpoint, model = %request.model, "Sending completion request");

        let mut builder = self.http.post(self.endpoint.clone()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(LLMError::from_status(status.as_u16(), body));
        }

        Self::parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_url_with_and_without_trailing_slash() {
        let a = OpenAICompatibleClient::completions_url("http://llm.internal:8000/v1").unwrap();
        let b = OpenAICompatibleClient::completions_url("http://llm.internal:8000/v1/").unwrap();

        assert_eq!(a.as_str(), "http://llm.internal:8000/v1/chat/completions");
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_base_url() {
        let result = OpenAICompatibleClient::new(ClientSettings::new("not a url", "m"));
        assert!(matches!(result, Err(LLMError::InvalidRequest(_))));
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{
            "model": "judge-7b",
            "choices": [{"message": {"role": "assistant", "content": "{\"accuracy\": 0.9}"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 30, "total_tokens": 150}
        }"#;

        let response = OpenAICompatibleClient::parse_response(body).unwrap();
        assert_eq!(response.model, "judge-7b");
        assert_eq!(response.content, "{\"accuracy\": 0.9}");
        assert_eq!(response.usage.total_tokens, 150);
        assert_eq!(response.finish_reason, "stop");
    }

    #[test]
    fn test_parse_response_without_choices() {
        let result = OpenAICompatibleClient::parse_response(r#"{"choices": []}"#);
        assert!(matches!(result, Err(LLMError::EmptyResponse(_))));
    }

    #[test]
    fn test_backend_name() {
        let settings = ClientSettings::new("http://localhost:8000/v1", "m");
        let client = OpenAICompatibleClient::new(settings).unwrap();
        assert_eq!(client.backend_name(), "openai-compatible");
        assert_eq!(client.default_model(), "m");
    }
}
