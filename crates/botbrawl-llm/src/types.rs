//! Common types for completion calls

use botbrawl_types::BrawlError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during a completion call
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("Provider not available: {provider}")]
    ProviderNotAvailable { provider: String },

    #[error("Request failed: {message}")]
    RequestFailed { message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Rate limited: retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },
}

pub type Result<T> = std::result::Result<T, LlmError>;

impl From<LlmError> for BrawlError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout { .. } => BrawlError::DependencyTimeout {
                service: "completion provider".to_string(),
            },
            LlmError::ConfigurationError { message } => BrawlError::internal(message),
            other => BrawlError::DependencyFailed {
                service: "completion provider".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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

/// Request to complete a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model to use (provider-specific)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Persona or role prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<Message>,
    /// Temperature (0.0-2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Ask the provider for a JSON object
    #[serde(default)]
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: None,
            system: None,
            messages,
            temperature: None,
            max_tokens: None,
            json_mode: false,
        }
    }

    /// Single-turn request: persona prompt plus one user message
    pub fn prompt(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self::new(vec![Message::user(user)]).with_system(system)
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }

    /// System prompt and every message, joined; used for scripted matching
    pub fn full_text(&self) -> String {
        let mut text = self.system.clone().unwrap_or_default();
        for message in &self.messages {
            text.push('\n');
            text.push_str(&message.content);
        }
        text
    }
}

/// Token usage information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Response from a completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    #[serde(default)]
    pub usage: TokenUsage,
    /// Which model answered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl CompletionResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: TokenUsage::default(),
            model: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botbrawl_types::ErrorClass;

    #[test]
    fn test_prompt_builder() {
        let request = CompletionRequest::prompt("You are a judge", "Score this")
            .with_temperature(0.2)
            .with_json_mode();
        assert_eq!(request.system.as_deref(), Some("You are a judge"));
        assert_eq!(request.messages, vec![Message::user("Score this")]);
        assert!(request.json_mode);
        assert_eq!(request.full_text(), "You are a judge\nScore this");
    }

    #[test]
    fn test_errors_map_to_dependency_class() {
        let err: BrawlError = LlmError::Timeout { seconds: 45 }.into();
        assert_eq!(err.class(), ErrorClass::Dependency);
        assert_eq!(err.status_code(), 504);

        let err: BrawlError = LlmError::NetworkError {
            message: "connection refused".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), 502);
    }
}
