//! Proxy error taxonomy
//!
//! Every rejection and failure the proxy can produce, each with a stable
//! machine-readable kind string that callers branch on. Messages are already
//! scrubbed by the time they land here; raw credentials never appear in a
//! payload.

use daygent_llm::Provider;
use serde::Serialize;
use thiserror::Error;

/// Errors returned to proxy callers
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The request failed validation before anything else ran
    #[error("{0}")]
    Validation(#[from] daygent_llm::ValidationError),

    /// The workspace hit a request-rate window cap
    #[error("Rate limit exceeded. Retry in {retry_after_seconds} seconds.")]
    RateLimited {
        /// Seconds until the nearest exhausted window resets
        retry_after_seconds: u64,
    },

    /// The workspace's monthly spend limit is reached
    #[error("{message}")]
    QuotaExceeded {
        /// Human-readable explanation including the limit
        message: String,
    },

    /// No usable credential for the requested provider
    #[error("No API credentials available for provider: {provider}")]
    NoCredentials {
        /// The provider the request targeted
        provider: Provider,
    },

    /// The upstream provider call failed
    #[error("Provider error: {0}")]
    Provider(#[from] daygent_llm::Error),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// Stable machine-readable kind, part of the caller-facing contract
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Validation(_) => "validation",
            ProxyError::RateLimited { .. } => "rate_limited",
            ProxyError::QuotaExceeded { .. } => "quota_exceeded",
            ProxyError::NoCredentials { .. } => "no_credentials",
            ProxyError::Provider(_) => "provider_error",
            ProxyError::Internal(_) => "internal",
        }
    }

    /// Retry hint in seconds, when one applies
    #[must_use]
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            ProxyError::RateLimited {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            ProxyError::Provider(daygent_llm::Error::RateLimited {
                retry_after_seconds,
            }) => *retry_after_seconds,
            _ => None,
        }
    }

    /// Serializable payload for callers
    #[must_use]
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind(),
            message: self.to_string(),
            retry_after_seconds: self.retry_after_seconds(),
        }
    }
}

/// Wire shape of a proxy error
#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    /// Stable kind string
    pub kind: &'static str,
    /// Scrubbed human-readable message
    pub message: String,
    /// Retry hint, present only for rate limits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

/// Result alias for proxy operations
pub type Result<T> = std::result::Result<T, ProxyError>;
