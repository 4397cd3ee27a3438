//! LLM Provider Trait
//!
//! This module defines the trait-based abstraction over text-generation
//! services, so the synthesizer can be driven by any chat-style API (or by a
//! stub in tests).

use crate::error::{AgentError, Result};
use async_trait::async_trait;
use serde::Serialize;

/// Who a chat message is from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

impl MessageRole {
    /// Wire name used by chat-completion APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
        }
    }
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, content)
    }

    fn with_role(role: MessageRole, content: impl Into<String>) -> Self {
        Message {
            role,
            content: content.into(),
        }
    }
}

/// Text returned by a provider, with whatever metadata the API reported
#[derive(Debug, Clone, Default)]
pub struct LLMResponse {
    pub content: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub model: Option<String>,
    /// e.g. "stop" or "length"
    pub finish_reason: Option<String>,
}

impl LLMResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Prompt plus completion tokens, when both were reported
    pub fn total_tokens(&self) -> Option<u32> {
        Some(self.input_tokens? + self.output_tokens?)
    }

    /// Whether generation stopped because it ran out of tokens
    pub fn is_truncated(&self) -> bool {
        self.finish_reason.as_deref() == Some("length")
    }
}

/// Sampling settings for one request; `None` leaves the provider default
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl GenerationParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Trait for LLM providers
///
/// One call is one request/response exchange. Implementations do not retry.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a response from the LLM
    ///
    /// # Arguments
    /// * `messages` - Conversation to send
    /// * `params` - Generation parameters
    async fn generate(&self, messages: &[Message], params: &GenerationParams)
        -> Result<LLMResponse>;

    /// Get the provider name
    fn provider_name(&self) -> &str;

    /// Check if the provider has an API key configured
    fn has_api_key(&self) -> bool;

    /// Validate the provider configuration
    fn validate_config(&self) -> Result<()> {
        if !self.has_api_key() {
            return Err(AgentError::Config(format!(
                "no API key configured for {}",
                self.provider_name()
            )));
        }
        Ok(())
    }
}
