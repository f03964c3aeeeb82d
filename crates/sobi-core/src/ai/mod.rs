//! Pluggable LLM backend abstraction
//!
//! # Architecture
//!
//! - `LlmBackend` trait: one chat-completion call plus a health check
//! - `LlmClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OpenAICompatibleBackend`, `OllamaBackend`, `MockBackend`
//!
//! Backends only move text. They return whatever the model said (possibly
//! empty) and fail only when the provider could not be reached or answered
//! with an error status; interpreting the reply is the validator's job.
//!
//! # Usage
//!
//! ```rust,ignore
//! let client = LlmClient::from_config(&config.llm)?;
//! let reply = client
//!     .complete(&CompletionRequest::new(TaskType::Analytics, "gpt-4o").user(data))
//!     .await?;
//! ```

mod mock;
mod ollama;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use mock::MockBackend;
pub use ollama::OllamaBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use async_trait::async_trait;

use crate::config::{BackendKind, LlmConfig};
use crate::error::Result;

/// Trait defining the interface for all LLM backends
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Send one chat completion and return the raw reply text
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Backend name (for logging)
    fn name(&self) -> &'static str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete LLM client enum
#[derive(Clone)]
pub enum LlmClient {
    /// OpenAI or a compatible server
    OpenAICompatible(OpenAICompatibleBackend),
    /// Ollama HTTP API
    Ollama(OllamaBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl LlmClient {
    /// Build the client described by the `[llm]` config section
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = match config.backend {
            BackendKind::OpenAI => {
                let backend = match config.api_key {
                    Some(ref key) => {
                        OpenAICompatibleBackend::with_api_key(&config.base_url, config.timeout, key)
                    }
                    None => {
                        tracing::warn!(
                            base_url = %config.base_url,
                            "No OPENAI_API_KEY set, sending unauthenticated requests"
                        );
                        OpenAICompatibleBackend::new(&config.base_url, config.timeout)
                    }
                };
                LlmClient::OpenAICompatible(backend)
            }
            BackendKind::Ollama => {
                LlmClient::Ollama(OllamaBackend::new(&config.base_url, config.timeout))
            }
            BackendKind::Mock => LlmClient::Mock(MockBackend::new()),
        };
        Ok(client)
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        LlmClient::Mock(MockBackend::new())
    }
}

impl From<MockBackend> for LlmClient {
    fn from(mock: MockBackend) -> Self {
        LlmClient::Mock(mock)
    }
}

// Implement LlmBackend for LlmClient by delegating to the inner backend
#[async_trait]
impl LlmBackend for LlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        match self {
            LlmClient::OpenAICompatible(b) => b.complete(request).await,
            LlmClient::Ollama(b) => b.complete(request).await,
            LlmClient::Mock(b) => b.complete(request).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            LlmClient::OpenAICompatible(b) => b.health_check().await,
            LlmClient::Ollama(b) => b.health_check().await,
            LlmClient::Mock(b) => b.health_check().await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            LlmClient::OpenAICompatible(b) => b.name(),
            LlmClient::Ollama(b) => b.name(),
            LlmClient::Mock(b) => b.name(),
        }
    }

    fn host(&self) -> &str {
        match self {
            LlmClient::OpenAICompatible(b) => b.host(),
            LlmClient::Ollama(b) => b.host(),
            LlmClient::Mock(b) => b.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_from_config_selects_backend() {
        let mut config = Config::embedded();

        config.llm.backend = BackendKind::Mock;
        assert_eq!(LlmClient::from_config(&config.llm).unwrap().name(), "mock");

        config.llm.backend = BackendKind::Ollama;
        config.llm.base_url = "http://localhost:11434/".into();
        let client = LlmClient::from_config(&config.llm).unwrap();
        assert_eq!(client.name(), "ollama");
        assert_eq!(client.host(), "http://localhost:11434");

        config.llm.backend = BackendKind::OpenAI;
        config.llm.api_key = Some("sk-test".into());
        assert_eq!(LlmClient::from_config(&config.llm).unwrap().name(), "openai");
    }

    #[tokio::test]
    async fn test_client_delegates_to_mock() {
        let mock = MockBackend::with_reply("hello");
        let client = LlmClient::from(mock.clone());
        let req = CompletionRequest::new(crate::config::TaskType::Analytics, "m").user("x");

        assert_eq!(client.complete(&req).await.unwrap(), "hello");
        assert!(client.health_check().await);
        assert_eq!(mock.call_count(), 1);
    }
}
