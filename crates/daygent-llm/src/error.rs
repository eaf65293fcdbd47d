//! Error types for daygent-llm

use thiserror::Error;

/// Provider-layer error type
#[derive(Debug, Error)]
pub enum Error {
    /// No adapter or credentials configured for a provider
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// Upstream rejected the API key (HTTP 401)
    #[error("provider rejected credentials")]
    InvalidCredentials,

    /// Upstream rate limit (HTTP 429)
    #[error("provider rate limit exceeded")]
    RateLimited {
        /// Seconds until the upstream window resets, when the provider says
        retry_after_seconds: Option<u64>,
    },

    /// Upstream returned a non-2xx status
    #[error("api error (status {status}): {message}")]
    Api {
        /// Upstream HTTP status code
        status: u16,
        /// Sanitized upstream message
        message: String,
    },

    /// Response body could not be decoded
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Transport-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Request exceeded the adapter's hard timeout
    #[error("timeout after {0}s")]
    Timeout(u64),

    /// The caller cancelled the in-flight request
    #[error("request cancelled")]
    Cancelled,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
