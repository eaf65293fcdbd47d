//! Normalized request/response envelope
//!
//! The provider-agnostic shapes used internally regardless of which upstream
//! vendor is called. Only the derived usage record survives a call; these
//! envelopes are never persisted as-is.

use crate::message::Message;
use serde::{Deserialize, Serialize};

/// Normalized chat completion request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier (provider-specific)
    pub model: String,
    /// Ordered conversation messages
    pub messages: Vec<Message>,
    /// Sampling temperature (0.0 - 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Create a new request for a model
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Add a message
    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Add messages
    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    /// Set the temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Token usage reported by the provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt-side tokens
    pub input_tokens: u32,
    /// Completion-side tokens
    pub output_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

/// A single completion choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// The generated message
    pub message: Message,
    /// Why generation stopped, if the provider reported it
    pub finish_reason: Option<String>,
}

/// Normalized chat completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Provider-assigned response id
    pub id: String,
    /// Model that produced the completion
    pub model: String,
    /// Unix timestamp of creation
    pub created: i64,
    /// Completion choices (at least one on success)
    pub choices: Vec<Choice>,
    /// Token usage, when the provider reports it
    pub usage: Option<TokenUsage>,
}

impl ChatResponse {
    /// Content of the first choice, if any
    #[must_use]
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}
