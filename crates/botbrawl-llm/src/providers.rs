//! Completion provider implementations

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::*;

/// Anything that can turn a persona prompt plus context into text
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Complete a conversation
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

/// Shared provider handle
pub type SharedProvider = Arc<dyn CompletionProvider>;

// ============================================================================
// OpenAI-Compatible Provider
// ============================================================================

/// Configuration for an OpenAI-compatible endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiCompatConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000/v1".to_string()
}

fn default_model() -> String {
    "default".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for OpenAiCompatConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Any OpenAI-compatible chat completions API (vLLM, llama.cpp, hosted)
pub struct OpenAiCompatProvider {
    config: OpenAiCompatConfig,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(config: OpenAiCompatConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LlmError::ConfigurationError {
                message: e.to_string(),
            })?;
        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[async_trait]
impl CompletionProvider for OpenAiCompatProvider {
    fn name(&self) -> &'static str {
        "openai-compat"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: MessageRole::System.as_str().to_string(),
                content: system.clone(),
            });
        }
        messages.extend(request.messages.iter().map(|m| ChatMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
        }));

        let model = request.model.unwrap_or_else(|| self.config.model.clone());
        let chat_request = ChatRequest {
            model: model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
            response_format: request
                .json_mode
                .then(|| serde_json::json!({"type": "json_object"})),
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let mut req = self.client.post(&url).json(&chat_request);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout {
                    seconds: self.config.request_timeout_secs,
                }
            } else {
                LlmError::NetworkError {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_seconds = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            return Err(LlmError::RateLimited { retry_after_seconds });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed {
                message: format!("HTTP {}: {}", status, body),
            });
        }

        let chat_response: ChatResponse =
            response.json().await.map_err(|e| LlmError::InvalidResponse {
                message: e.to_string(),
            })?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse {
                message: "no choices returned".to_string(),
            })?;
        let usage = chat_response.usage.unwrap_or_default();

        Ok(CompletionResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            },
            model: Some(model),
        })
    }
}

// ============================================================================
// Scripted Provider (deterministic, offline)
// ============================================================================

/// What a scripted rule answers with
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Fail(String),
    /// Sleep before answering; lets callers exercise their timeouts
    Delayed(Duration, String),
}

#[derive(Debug, Clone)]
struct ScriptRule {
    needle: String,
    reply: ScriptedReply,
}

/// Deterministic provider driven by substring rules
///
/// The first rule whose needle appears in the request's system prompt or
/// messages decides the reply; otherwise the default reply is used.
pub struct ScriptedProvider {
    rules: Vec<ScriptRule>,
    default_reply: ScriptedReply,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(default_text: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            default_reply: ScriptedReply::Text(default_text.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Provider whose every call fails
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            default_reply: ScriptedReply::Fail(reason.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_rule(mut self, needle: impl Into<String>, reply: ScriptedReply) -> Self {
        self.rules.push(ScriptRule {
            needle: needle.into(),
            reply,
        });
        self
    }

    pub fn reply_when(self, needle: impl Into<String>, text: impl Into<String>) -> Self {
        self.with_rule(needle, ScriptedReply::Text(text.into()))
    }

    pub fn fail_when(self, needle: impl Into<String>, reason: impl Into<String>) -> Self {
        self.with_rule(needle, ScriptedReply::Fail(reason.into()))
    }

    /// Number of calls received so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Every request received so far
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().clone()
    }

    fn pick(&self, text: &str) -> ScriptedReply {
        self.rules
            .iter()
            .find(|rule| text.contains(&rule.needle))
            .map(|rule| rule.reply.clone())
            .unwrap_or_else(|| self.default_reply.clone())
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let reply = self.pick(&request.full_text());
        self.calls.lock().push(request);

        match reply {
            ScriptedReply::Text(text) => Ok(CompletionResponse::new(text)),
            ScriptedReply::Fail(message) => Err(LlmError::RequestFailed { message }),
            ScriptedReply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(CompletionResponse::new(text))
            }
        }
    }
}
