//! Backend-agnostic completion request types

use serde::Serialize;

use crate::config::TaskType;

/// Chat role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
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

/// Shape the reply is asked to take
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResponseFormat {
    /// Free text
    #[default]
    Text,
    /// JSON constrained by a strict schema
    JsonSchema {
        name: String,
        schema: serde_json::Value,
    },
}

/// A single completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Which pipeline stage is asking (for logging and mock dispatch)
    pub task: TaskType,
    pub model: String,
    pub messages: Vec<Message>,
    /// Always 0.0; no caller can raise it
    pub temperature: f32,
    pub response_format: ResponseFormat,
}

impl CompletionRequest {
    pub fn new(task: TaskType, model: impl Into<String>) -> Self {
        Self {
            task,
            model: model.into(),
            messages: Vec::new(),
            temperature: 0.0,
            response_format: ResponseFormat::Text,
        }
    }

    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::system(content));
        self
    }

    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::user(content));
        self
    }

    pub fn response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }

    /// Concatenated user content (handy for assertions and mocks)
    pub fn user_text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_message_order() {
        let req = CompletionRequest::new(TaskType::Analytics, "gpt-4o")
            .system("rules")
            .user("data");

        assert_eq!(req.model, "gpt-4o");
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.user_text(), "data");
        assert_eq!(req.response_format, ResponseFormat::Text);
        assert_eq!(req.temperature, 0.0);
    }

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));
    }
}
