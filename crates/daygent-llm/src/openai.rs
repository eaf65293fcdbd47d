//! OpenAI chat completions adapter
//!
//! Speaks the `/v1/chat/completions` wire format with Bearer auth. The
//! adapter holds no credential of its own: the key arrives per call, since a
//! single adapter instance serves every workspace.

use crate::error::{Error, Result};
use crate::message::Message;
use crate::provider::{Provider, ProviderAdapter};
use crate::request::{ChatRequest, ChatResponse, Choice, TokenUsage};
use crate::util::{mask_api_key, sanitize_api_error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// OpenAI API base URL
pub const OPENAI_API_BASE: &str = "https://api.openai.com";

/// Default request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// OpenAI adapter configuration
#[derive(Clone)]
pub struct OpenAiConfig {
    /// Base URL, overridable for tests and gateways
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: OPENAI_API_BASE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl OpenAiConfig {
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

// Wire types for the chat completions endpoint
#[derive(Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct WireResponse {
    id: String,
    model: String,
    created: i64,
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    role: String,
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// OpenAI provider adapter
pub struct OpenAiAdapter {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiAdapter {
    /// Create an adapter from a configuration
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn convert_message(msg: &Message) -> WireMessage {
        WireMessage {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }
    }

    fn convert_response(wire: WireResponse) -> Result<ChatResponse> {
        if wire.choices.is_empty() {
            return Err(Error::InvalidResponse("no choices in response".to_string()));
        }

        let choices = wire
            .choices
            .into_iter()
            .map(|c| {
                let role = crate::message::Role::parse(&c.message.role)
                    .unwrap_or(crate::message::Role::Assistant);
                Choice {
                    message: Message {
                        role,
                        content: c.message.content.unwrap_or_default(),
                    },
                    finish_reason: c.finish_reason,
                }
            })
            .collect();

        Ok(ChatResponse {
            id: wire.id,
            model: wire.model,
            created: wire.created,
            choices,
            usage: wire.usage.map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }
}

/// Map a non-success upstream status to the adapter error taxonomy.
///
/// 401 means the credential itself is bad; 429 is the upstream throttling us,
/// with the `Retry-After` value carried along when the provider sent one.
/// Everything else surfaces as an API error with a scrubbed message.
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
impl ProviderAdapter for OpenAiAdapter {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    #[instrument(skip(self, request, api_key), fields(model = %request.model, key = %mask_api_key(api_key)))]
    async fn send(&self, request: &ChatRequest, api_key: &str) -> Result<ChatResponse> {
        let wire_request = WireRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(Self::convert_message).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!("sending chat completion to OpenAI");

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    #[test]
    fn test_config_builder() {
        let config = OpenAiConfig::new()
            .with_base_url("http://localhost:8089")
            .with_timeout(Duration::from_secs(3));

        assert_eq!(config.base_url, "http://localhost:8089");
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_default_timeout_is_ten_seconds() {
        let config = OpenAiConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_unauthorized_maps_to_invalid_credentials() {
        let err = map_error_status(401, "Incorrect API key provided", None);
        assert!(matches!(err, Error::InvalidCredentials));
    }

    #[test]
    fn test_rate_limited_carries_retry_after() {
        let err = map_error_status(429, "Rate limit reached", Some(17));
        match err {
            Error::RateLimited {
                retry_after_seconds,
            } => assert_eq!(retry_after_seconds, Some(17)),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_rate_limited_without_header() {
        let err = map_error_status(429, "Rate limit reached", None);
        assert!(matches!(
            err,
            Error::RateLimited {
                retry_after_seconds: None
            }
        ));
    }

    #[test]
    fn test_other_status_scrubs_body() {
        let err = map_error_status(500, "server error, api_key sk-abc leaked", None);
        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 500);
                assert!(!message.contains("sk-abc"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_convert_response() {
        let body = r#"{
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello there"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16}
        }"#;
        let wire: WireResponse = serde_json::from_str(body).unwrap();
        let response = OpenAiAdapter::convert_response(wire).unwrap();

        assert_eq!(response.id, "chatcmpl-123");
        assert_eq!(response.model, "gpt-4o");
        assert_eq!(response.choices.len(), 1);
        assert_eq!(response.choices[0].message.role, Role::Assistant);
        assert_eq!(response.first_content(), Some("Hello there"));
        let usage = response.usage.unwrap();
        assert_eq!(usage.input_tokens, 12);
        assert_eq!(usage.output_tokens, 4);
        assert_eq!(usage.total_tokens, 16);
    }

    #[test]
    fn test_convert_response_null_content() {
        let body = r#"{
            "id": "chatcmpl-456",
            "created": 1700000001,
            "model": "gpt-4o",
            "choices": [{
                "message": {"role": "assistant", "content": null},
                "finish_reason": "length"
            }],
            "usage": null
        }"#;
        let wire: WireResponse = serde_json::from_str(body).unwrap();
        let response = OpenAiAdapter::convert_response(wire).unwrap();
        assert_eq!(response.first_content(), Some(""));
        assert!(response.usage.is_none());
    }

    #[test]
    fn test_convert_response_no_choices() {
        let body = r#"{"id": "x", "created": 0, "model": "gpt-4o", "choices": []}"#;
        let wire: WireResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(
            OpenAiAdapter::convert_response(wire),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_wire_request_omits_unset_options() {
        let request = WireRequest {
            model: "gpt-4o".to_string(),
            messages: vec![WireMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            max_tokens: None,
            temperature: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("max_tokens"));
        assert!(!json.contains("temperature"));
    }
}
