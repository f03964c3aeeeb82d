//! Ollama backend implementation (`/api/chat`)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

use super::parsing::preview;
use super::types::{CompletionRequest, Message, ResponseFormat};
use super::LlmBackend;

/// Ollama backend
#[derive(Clone)]
pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
}

impl OllamaBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Request to Ollama chat API
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    /// `"json"` or a JSON schema
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<Value>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Response from Ollama chat API
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

fn format_field(format: &ResponseFormat) -> Option<Value> {
    match format {
        ResponseFormat::Text => None,
        ResponseFormat::JsonSchema { schema, .. } => Some(schema.clone()),
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = OllamaChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            format: format_field(&request.response_format),
            options: OllamaOptions {
                temperature: request.temperature,
            },
        };

        let response = self
            .http_client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "Ollama API error {}: {}",
                status,
                preview(&body)
            )));
        }

        let chat: OllamaChatResponse = response.json().await?;
        Ok(chat.message.content)
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn name(&self) -> &'static str {
        "ollama"
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

    #[test]
    fn test_format_field() {
        assert!(format_field(&ResponseFormat::Text).is_none());
        let schema = serde_json::json!({"type": "object"});
        assert_eq!(
            format_field(&ResponseFormat::JsonSchema {
                name: "x".into(),
                schema: schema.clone()
            }),
            Some(schema)
        );
    }

    #[tokio::test]
    async fn test_complete_against_mock_server() {
        let server = MockCompletionServer::start(r#"{"results": []}"#).await;
        let backend = OllamaBackend::new(&server.url(), Duration::from_secs(5));

        let schema = serde_json::json!({"type": "object", "required": ["results"]});
        let req = CompletionRequest::new(TaskType::Classification, "llama3.2")
            .user("x")
            .response_format(ResponseFormat::JsonSchema {
                name: "expenditure_categories".into(),
                schema: schema.clone(),
            });
        let reply = backend.complete(&req).await.unwrap();
        assert_eq!(reply, r#"{"results": []}"#);

        let seen = server.requests();
        assert_eq!(seen[0]["format"], schema);
        assert_eq!(seen[0]["stream"], false);
        assert!(backend.health_check().await);
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let backend = OllamaBackend::new("http://127.0.0.1:1", Duration::from_secs(1));
        assert!(!backend.health_check().await);
    }
}
