//! Daygent LLM - Provider Abstraction
//!
//! This crate provides the provider-agnostic layer of the Daygent LLM proxy:
//! - Message: role-tagged conversation messages
//! - Request: the normalized chat request/response envelope
//! - Validate: request validation and prompt sanitization
//! - Pricing: the static cost model with per-model token pricing
//! - Provider: the `ProviderAdapter` trait and adapter registry
//! - OpenAI: chat-completions adapter
//! - Anthropic: messages-API adapter

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod anthropic;
pub mod error;
pub mod message;
pub mod openai;
pub mod pricing;
pub mod provider;
pub mod request;
pub mod util;
pub mod validate;

pub use error::{Error, Result};
pub use message::{Message, Role};
pub use pricing::{default_pricing, CostModel, ModelPricing};
pub use provider::{AdapterRegistry, Provider, ProviderAdapter};
pub use request::{ChatRequest, ChatResponse, Choice, TokenUsage};
pub use validate::{sanitize_prompt_content, validate, FieldViolation, ValidationError};

// Re-export adapter types
pub use anthropic::{AnthropicAdapter, AnthropicConfig};
pub use openai::{OpenAiAdapter, OpenAiConfig};
