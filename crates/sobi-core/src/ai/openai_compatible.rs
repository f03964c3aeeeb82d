//! OpenAI-compatible backend implementation
//!
//! Works with api.openai.com and any server implementing the
//! `/v1/chat/completions` API (vLLM, LocalAI, llama-server, ...).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Error, Result};

use super::parsing::preview;
use super::types::{CompletionRequest, Message, ResponseFormat};
use super::LlmBackend;

/// OpenAI-compatible backend
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAICompatibleBackend {
    /// Create a new OpenAI-compatible backend
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Create with an API key
    pub fn with_api_key(base_url: &str, timeout: Duration, api_key: &str) -> Self {
        Self {
            api_key: Some(api_key.to_string()),
            ..Self::new(base_url, timeout)
        }
    }

    fn build_request<'a>(&self, request: &'a CompletionRequest) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            response_format: response_format_json(&request.response_format),
            stream: false,
        }
    }
}

/// Map the request's format onto OpenAI's `response_format` field
fn response_format_json(format: &ResponseFormat) -> Option<Value> {
    match format {
        ResponseFormat::Text => None,
        ResponseFormat::JsonSchema { name, schema } => Some(json!({
            "type": "json_schema",
            "json_schema": {
                "name": name,
                "strict": true,
                "schema": schema,
            }
        })),
    }
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    stream: bool,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    /// Null when the model refuses under a strict schema
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[async_trait]
impl LlmBackend for OpenAICompatibleBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = self.build_request(request);

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&body);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.bearer_auth(api_key);
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "OpenAI API error {}: {}",
                status,
                preview(&body)
            )));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;
        let message = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| Error::Provider("No choices in OpenAI API response".into()))?;

        // A refusal or empty content is a content problem, not a transport one
        match (message.content, message.refusal) {
            (Some(content), _) => Ok(content),
            (None, Some(refusal)) => {
                debug!(refusal = %refusal, "Model refused");
                Ok(String::new())
            }
            (None, None) => Ok(String::new()),
        }
    }

    async fn health_check(&self) -> bool {
        let mut req = self.http_client.get(format!("{}/v1/models", self.base_url));
        if let Some(ref api_key) = self.api_key {
            req = req.bearer_auth(api_key);
        }
        match req.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn name(&self) -> &'static str {
        "openai"
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaskType;
    use crate::test_utils::MockCompletionServer;

    fn timeout() -> Duration {
        Duration::from_secs(5)
    }

    #[test]
    fn test_backend_new_trims_trailing_slash() {
        let backend = OpenAICompatibleBackend::new("http://localhost:12434/", timeout());
        assert_eq!(backend.host(), "http://localhost:12434");
        assert!(backend.api_key.is_none());
    }

    #[test]
    fn test_backend_with_api_key() {
        let backend =
            OpenAICompatibleBackend::with_api_key("https://api.openai.com", timeout(), "sk-test");
        assert_eq!(backend.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_request_serialization_text() {
        let backend = OpenAICompatibleBackend::new("http://x", timeout());
        let req = CompletionRequest::new(TaskType::Classification, "gpt-4.1-nano")
            .system("sys")
            .user("usr");
        let json = serde_json::to_value(backend.build_request(&req)).unwrap();

        assert_eq!(json["model"], "gpt-4.1-nano");
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "usr");
        assert!(json.get("response_format").is_none());
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_request_serialization_schema() {
        let backend = OpenAICompatibleBackend::new("http://x", timeout());
        let req = CompletionRequest::new(TaskType::Analytics, "gpt-4o").response_format(
            ResponseFormat::JsonSchema {
                name: "overspending".into(),
                schema: json!({"type": "object"}),
            },
        );
        let json = serde_json::to_value(backend.build_request(&req)).unwrap();
        assert_eq!(json["response_format"]["type"], "json_schema");
        assert_eq!(json["response_format"]["json_schema"]["strict"], true);
        assert_eq!(json["response_format"]["json_schema"]["name"], "overspending");
    }

    #[tokio::test]
    async fn test_complete_against_mock_server() {
        let server = MockCompletionServer::start("1, 3, 7").await;
        let backend = OpenAICompatibleBackend::with_api_key(&server.url(), timeout(), "sk-test");

        let req = CompletionRequest::new(TaskType::Analytics, "gpt-4o").user("data");
        let reply = backend.complete(&req).await.unwrap();
        assert_eq!(reply, "1, 3, 7");

        let seen = server.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["model"], "gpt-4o");
    }

    #[tokio::test]
    async fn test_error_status_is_provider_failure() {
        let server =
            MockCompletionServer::start_with_status(axum::http::StatusCode::TOO_MANY_REQUESTS)
                .await;
        let backend = OpenAICompatibleBackend::new(&server.url(), timeout());

        let req = CompletionRequest::new(TaskType::Classification, "m").user("x");
        let err = backend.complete(&req).await.unwrap_err();
        assert!(err.is_provider_failure());
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockCompletionServer::start("ok").await;
        let backend = OpenAICompatibleBackend::new(&server.url(), timeout());
        assert!(backend.health_check().await);
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let backend = OpenAICompatibleBackend::new("http://127.0.0.1:1", timeout());
        assert!(!backend.health_check().await);
    }

    #[tokio::test]
    async fn test_connection_refused_is_provider_failure() {
        let backend = OpenAICompatibleBackend::new("http://127.0.0.1:1", timeout());
        let req = CompletionRequest::new(TaskType::Classification, "m").user("x");
        let err = backend.complete(&req).await.unwrap_err();
        assert!(err.is_provider_failure());
    }
}
