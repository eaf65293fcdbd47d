//! Anthropic messages adapter
//!
//! Speaks the `/v1/messages` wire format. Anthropic differs from the chat
//! completions shape in two ways handled here: system messages travel in a
//! top-level `system` field rather than in the message list, and `max_tokens`
//! is mandatory.

use crate::error::{Error, Result};
use crate::message::{Message, Role};
use crate::provider::{Provider, ProviderAdapter};
use crate::request::{ChatRequest, ChatResponse, Choice, TokenUsage};
use crate::util::{mask_api_key, sanitize_api_error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// Anthropic API base URL
pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";

/// Anthropic API version header value
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// `max_tokens` sent when the caller did not specify one
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Anthropic adapter configuration
#[derive(Clone)]
pub struct AnthropicConfig {
    /// Base URL, overridable for tests and gateways
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: ANTHROPIC_API_BASE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl AnthropicConfig {
    /// Create a configuration with the default base URL and timeout
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// Wire types for the messages endpoint
#[derive(Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct WireResponse {
    id: String,
    model: String,
    content: Vec<WireContentBlock>,
    stop_reason: Option<String>,
    usage: WireUsage,
}

#[derive(Deserialize)]
struct WireContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct WireUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Anthropic provider adapter
pub struct AnthropicAdapter {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicAdapter {
    /// Create an adapter from a configuration
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Split a chat request into Anthropic's shape: system messages are
    /// accumulated into the top-level `system` string, everything else stays
    /// in the message list.
    fn convert_request(request: &ChatRequest) -> WireRequest {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut messages = Vec::new();

        for msg in &request.messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                _ => messages.push(WireMessage {
                    role: msg.role.as_str().to_string(),
                    content: msg.content.clone(),
                }),
            }
        }

        WireRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: if system_parts.is_empty() {
                None
            } else {
                Some(system_parts.join("\n\n"))
            },
            temperature: request.temperature,
        }
    }

    fn convert_response(wire: WireResponse) -> Result<ChatResponse> {
        let text: String = wire
            .content
            .iter()
            .filter(|b| b.block_type == "text")
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        if wire.content.is_empty() {
            return Err(Error::InvalidResponse(
                "no content blocks in response".to_string(),
            ));
        }

        let usage = TokenUsage {
            input_tokens: wire.usage.input_tokens,
            output_tokens: wire.usage.output_tokens,
            total_tokens: wire.usage.input_tokens + wire.usage.output_tokens,
        };

        Ok(ChatResponse {
            id: wire.id,
            model: wire.model,
            created: chrono::Utc::now().timestamp(),
            choices: vec![Choice {
                message: Message::assistant(text),
                finish_reason: wire.stop_reason,
            }],
            usage: Some(usage),
        })
    }
}

fn map_error_status(status: u16, body: &str, retry_after: Option<u64>) -> Error {
    match status {
        401 => Error::InvalidCredentials,
        429 => Error::RateLimited {
            retry_after_seconds: retry_after,
        },
        _ => Error::Api {
            status,
            message: sanitize_api_error(body),
        },
    }
}

fn parse_retry_after(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
}

fn map_send_error(e: reqwest::Error, timeout: Duration) -> Error {
    if e.is_timeout() {
        Error::Timeout(timeout.as_secs())
    } else {
        Error::Network(sanitize_api_error(&e.to_string()))
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    #[instrument(skip(self, request, api_key), fields(model = %request.model, key = %mask_api_key(api_key)))]
    async fn send(&self, request: &ChatRequest, api_key: &str) -> Result<ChatResponse> {
        let wire_request = Self::convert_request(request);

        debug!("sending message request to Anthropic");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.config.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            return Err(map_error_status(status.as_u16(), &body, retry_after));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;

        Self::convert_response(wire)
    }
}
