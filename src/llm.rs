//! Groq API client (OpenAI-compatible chat completions)
//!
//! The generation backend is treated as an opaque text transform behind the
//! `TextGenerator` trait. Uses a long-lived reqwest::Client for connection
//! pooling.

use crate::error::AnalyzerError;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

/// One turn of a generation conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
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

/// Trait for text generation (LLM controlled)
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for a conversation under a system prompt
    async fn generate(&self, system_prompt: &str, messages: &[ChatMessage]) -> Result<String>;
}

/// Reusable Groq client (connection-pooled)
pub struct GroqClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GroqClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| {
                AnalyzerError::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[async_trait]
impl TextGenerator for GroqClient {
    async fn generate(&self, system_prompt: &str, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut all_messages = Vec::with_capacity(messages.len() + 1);
        all_messages.push(ChatMessage::system(system_prompt));
        all_messages.extend_from_slice(messages);

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: all_messages,
            temperature: 0.2,
        };

        info!(model = %self.model, "Calling Groq API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Groq API request failed: {}", e);
                AnalyzerError::LlmError(format!("Groq API error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Groq API error response: {}", error_text);
            return Err(AnalyzerError::LlmError(format!(
                "Groq API error: {}",
                error_text
            )));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Groq response: {}", e);
            AnalyzerError::LlmError(format!("Groq parse error: {}", e))
        })?;

        let answer = completion
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or_else(|| AnalyzerError::LlmError("No response from Groq API".to_string()))?;

        info!(chars = answer.len(), "Groq response received");

        Ok(answer)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Mock generator for development & testing
/// Keeps the pipeline functional without an LLM dependency.
///
/// First turn of each stage conversation requests the document capability;
/// once a capability result is visible it produces a deterministic answer.
pub struct MockGenerator {
    calls: std::sync::Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Instructions seen so far, one entry per generation call
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, system_prompt: &str, messages: &[ChatMessage]) -> Result<String> {
        let instruction = messages
            .first()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.calls.lock().unwrap().push(instruction);

        let has_capability_result = messages
            .iter()
            .any(|m| m.role == "user" && m.content.starts_with("Result of"));

        if !has_capability_result && system_prompt.contains("read_financial_document") {
            return Ok(
                "```json\n{\"action\": \"read_financial_document\", \"input\": {}}\n```"
                    .to_string(),
            );
        }

        let document_note = messages
            .iter()
            .rev()
            .find(|m| m.role == "user" && m.content.starts_with("Result of"))
            .map(|m| {
                if m.content.contains("ERROR") {
                    "The document could not be parsed; findings are limited."
                } else {
                    "Findings are based on the extracted document text."
                }
            })
            .unwrap_or("No document capability was consulted.");

        Ok(format!("Mock analysis. {}", document_note))
    }
}
